//! Human-readable and JSON rendering of command results

use backstow_core::{Folder, ObjectInfo};
use prettytable::{format, row, Table};
use serde::Serialize;
use std::io::{stdout, Write};

/// Output of a CLI command
pub trait CliOutput: Serialize {
    /// Render for humans
    fn table(&self) -> Table;

    /// Print as a table, or as JSON when `json` is set
    fn print_output(&self, json: bool) -> anyhow::Result<()> {
        if json {
            let mut out = stdout().lock();
            serde_json::to_writer_pretty(&mut out, &self)?;
            writeln!(out)?;
        } else {
            self.table().printstd();
        }
        Ok(())
    }
}

/// Contents of one folder
#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    /// Listed folder path
    pub path: String,
    /// Backend kind
    pub backend: &'static str,
    /// Folder identity hash
    pub hash: String,
    /// Objects, named relative to `path`
    pub objects: Vec<ObjectInfo>,
    /// Immediate sub-folder paths
    pub sub_folders: Vec<String>,
}

impl FolderListing {
    /// Build a listing for `folder`
    pub fn new(folder: &Folder, objects: Vec<ObjectInfo>, sub_folders: &[Folder]) -> Self {
        Self {
            path: folder.get_path().to_string(),
            backend: folder.kind(),
            hash: folder.hash().to_string(),
            objects,
            sub_folders: sub_folders
                .iter()
                .map(|f| f.get_path().to_string())
                .collect(),
        }
    }
}

impl CliOutput for FolderListing {
    fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(default_table_format());
        table.set_titles(row![b->"Name", br->"Size", b->"Last modified"]);
        for folder in &self.sub_folders {
            let name = folder.strip_prefix(self.path.as_str()).unwrap_or(folder);
            table.add_row(row![name, r->"-", "-"]);
        }
        for object in &self.objects {
            table.add_row(row![
                object.name,
                r->object.size,
                object.last_modified.format("%Y-%m-%d %H:%M:%S"),
            ]);
        }
        table
    }
}

/// Result of sealing or opening a backup data key
#[derive(Debug, Clone, Serialize)]
pub struct KeyReport {
    /// Backup folder holding the wrapped key
    pub folder: String,
    /// Master key the data key is wrapped under
    pub master_key_ref: String,
    /// Short fingerprint of the data key; never the key itself
    pub fingerprint: String,
}

impl CliOutput for KeyReport {
    fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(default_table_format());
        table.set_titles(row![b->"Folder", b->"Master key", b->"Fingerprint"]);
        table.add_row(row![self.folder, self.master_key_ref, self.fingerprint]);
        table
    }
}

/// Default style for tables printed to stdout
fn default_table_format() -> format::TableFormat {
    format::FormatBuilder::new()
        .separators(
            &[
                format::LinePosition::Top,
                format::LinePosition::Bottom,
                format::LinePosition::Title,
            ],
            format::LineSeparator::new('-', '-', '-', '-'),
        )
        .padding(1, 1)
        .build()
}
