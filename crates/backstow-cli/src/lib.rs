//! # Backstow CLI
//!
//! Command-line access to Backstow storage: browse and move backup objects
//! on any configured backend, and seal or open per-backup data keys.
//!
//! This crate provides:
//! - **Configuration**: Layered file and environment configuration
//! - **Commands**: `ls`, `get`, `put`, `rm`, `cp` and `key`
//! - **Output**: Tables for humans, JSON for scripts

pub mod commands;
pub mod config;
pub mod output;

pub use commands::{execute, Command, KeyCommand};
pub use config::BackstowConfig;
pub use output::{CliOutput, FolderListing, KeyReport};
