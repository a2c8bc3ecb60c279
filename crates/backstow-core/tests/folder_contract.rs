//! The folder contract, exercised identically against every engine

use backstow_core::{Folder, StorageConfig};
use backstow_storage::{CloudEngine, FsEngine, MemoryEngine, StorageEngine};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

fn memory_root() -> Folder {
    Folder::new(Arc::new(MemoryEngine::new()), "")
}

fn fs_root() -> (TempDir, Folder) {
    let dir = tempfile::tempdir().unwrap();
    let engine: Arc<dyn StorageEngine> = Arc::new(FsEngine::new(dir.path()).unwrap());
    (dir, Folder::new(engine, ""))
}

fn cloud_root() -> Folder {
    Folder::new(Arc::new(CloudEngine::in_memory()), "")
}

async fn read_to_vec(folder: &Folder, name: &str) -> Vec<u8> {
    let mut reader = folder.read_object(name).await.unwrap();
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}

async fn first_backup_scenario(root: Folder) {
    let (objects, sub_folders) = root.list_folder().await.unwrap();
    assert!(objects.is_empty());
    assert!(sub_folders.is_empty());

    let content = br#"{"id":"x"}"#;
    root.put_object("backups/b1.json", &content[..]).await.unwrap();

    let (objects, sub_folders) = root.list_folder().await.unwrap();
    assert!(objects.is_empty());
    assert_eq!(sub_folders.len(), 1);
    assert_eq!(sub_folders[0].get_path(), "backups/");

    let backups = root.get_sub_folder("backups/");
    let (objects, sub_folders) = backups.list_folder().await.unwrap();
    assert!(sub_folders.is_empty());
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].name, "b1.json");
    assert_eq!(objects[0].size, content.len() as u64);

    assert_eq!(read_to_vec(&backups, "b1.json").await, content);
}

async fn copy_scenario(root: Folder) {
    let data = b"base backup payload".to_vec();
    root.put_object_bytes("n1", data.clone()).await.unwrap();
    root.copy_object("n1", "copies/n2").await.unwrap();

    assert_eq!(read_to_vec(&root, "copies/n2").await, data);
    assert_eq!(read_to_vec(&root, "n1").await, data);

    root.put_object_bytes("n1", "replaced").await.unwrap();
    root.copy_object("n1", "copies/n2").await.unwrap();
    assert_eq!(read_to_vec(&root, "copies/n2").await, b"replaced");

    assert!(root.copy_object("absent", "x").await.unwrap_err().is_not_found());
}

async fn delete_scenario(root: Folder) {
    let folder = root.get_sub_folder("wal");
    for name in ["000001", "000002", "000003"] {
        folder.put_object_bytes(name, name).await.unwrap();
    }

    folder.delete_objects(&["000001", "000003", "000009"]).await.unwrap();
    let (objects, _) = folder.list_folder().await.unwrap();
    let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["000002"]);
}

async fn parallel_put_scenario(root: Folder) {
    const N: usize = 48;
    let folder = root.get_sub_folder("parallel");

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let folder = folder.clone();
            tokio::spawn(async move {
                let body = vec![b'x'; i + 1];
                folder.put_object_bytes(&format!("part_{:03}", i), body).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let (objects, sub_folders) = folder.list_folder().await.unwrap();
    assert!(sub_folders.is_empty());
    assert_eq!(objects.len(), N);
    let names: HashSet<_> = objects.iter().map(|o| o.name.clone()).collect();
    assert_eq!(names.len(), N);
    for object in &objects {
        let index: u64 = object.name["part_".len()..].parse().unwrap();
        assert_eq!(object.size, index + 1);
    }
}

async fn sub_folder_scenario(root: Folder) {
    let nested = root.get_sub_folder("a").get_sub_folder("b");
    let joined = root.get_sub_folder("a/b");
    nested.put_object_bytes("leaf", "v").await.unwrap();

    assert!(joined.exists("leaf").await.unwrap());
    assert!(root.exists("a/b/leaf").await.unwrap());
    assert!(!root.get_sub_folder("a/bb").exists("leaf").await.unwrap());

    let (objects, sub_folders) = root.get_sub_folder("a").list_folder().await.unwrap();
    assert!(objects.is_empty());
    assert_eq!(sub_folders[0].get_path(), "a/b/");
}

async fn folder_name_scenario(root: Folder) {
    root.put_object_bytes("a/b", "leaf").await.unwrap();

    root.delete_objects(&["a"]).await.unwrap();
    assert!(root.exists("a/b").await.unwrap());

    let err = root.copy_object("a", "z").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!root.exists("z").await.unwrap());
}

async fn reserved_character_scenario(root: Folder) {
    let wal = root.get_sub_folder("wal");
    for name in ["wal#1", "50% done", "q?x=1&y"] {
        wal.put_object_bytes(name, name).await.unwrap();
    }

    let (objects, _) = wal.list_folder().await.unwrap();
    let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["50% done", "q?x=1&y", "wal#1"]);
    for name in names {
        assert!(wal.exists(name).await.unwrap());
        assert_eq!(read_to_vec(&wal, name).await, name.as_bytes());
    }
}

#[tokio::test]
async fn memory_engine_contract() {
    first_backup_scenario(memory_root()).await;
    copy_scenario(memory_root()).await;
    delete_scenario(memory_root()).await;
    parallel_put_scenario(memory_root()).await;
    sub_folder_scenario(memory_root()).await;
    folder_name_scenario(memory_root()).await;
    reserved_character_scenario(memory_root()).await;
}

#[tokio::test]
async fn filesystem_engine_contract() {
    let (_dir, root) = fs_root();
    first_backup_scenario(root).await;
    let (_dir, root) = fs_root();
    copy_scenario(root).await;
    let (_dir, root) = fs_root();
    delete_scenario(root).await;
    let (_dir, root) = fs_root();
    parallel_put_scenario(root).await;
    let (_dir, root) = fs_root();
    sub_folder_scenario(root).await;
    let (_dir, root) = fs_root();
    folder_name_scenario(root).await;
    let (_dir, root) = fs_root();
    reserved_character_scenario(root).await;
}

#[tokio::test]
async fn cloud_engine_contract() {
    first_backup_scenario(cloud_root()).await;
    copy_scenario(cloud_root()).await;
    delete_scenario(cloud_root()).await;
    parallel_put_scenario(cloud_root()).await;
    sub_folder_scenario(cloud_root()).await;
    folder_name_scenario(cloud_root()).await;
    reserved_character_scenario(cloud_root()).await;
}

#[tokio::test]
async fn prefixed_root_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::Filesystem {
        root_prefix: "/cluster-7/".into(),
        directory: dir.path().to_path_buf(),
    };
    let root = config.open().unwrap();
    assert_eq!(root.get_path(), "cluster-7/");

    root.put_object_bytes("backups/b1.json", "{}").await.unwrap();
    assert!(dir.path().join("cluster-7/backups/b1.json").is_file());

    let reopened = config.open().unwrap();
    assert_eq!(reopened.hash(), root.hash());
    assert!(reopened.exists("backups/b1.json").await.unwrap());
}
