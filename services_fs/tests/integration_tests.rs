//! Integration tests for the filesystem service
//!
//! These tests validate the complete filesystem functionality including:
//! - Block allocation and reclamation
//! - File content semantics (truncate, read, write, seek)
//! - Directory hierarchy and path resolution
//! - Hard links, symbolic links and link counts

use fs_types::{DescriptorKind, Fd, FsConfig, LogLevel, ROOT_ID};
use services_fs::{FileSystem, FileSystemOperations, FsError, UnlinkOutcome};
use std::io::Write;

fn fs() -> FileSystem {
    FileSystem::with_defaults().unwrap()
}

/// 10 blocks of 8 bytes; the root directory takes 8 of them
fn tight_fs() -> FileSystem {
    FileSystem::new(FsConfig {
        block_size: 8,
        max_blocks: 10,
        max_descriptors: 8,
        dir_default_size: 64,
        ..FsConfig::default()
    })
    .unwrap()
}

#[test]
fn test_complete_file_workflow() {
    let mut fs = fs();

    fs.mkdir("docs").unwrap();
    let id = fs.create("docs/readme.txt").unwrap();
    fs.truncate("docs/readme.txt", 100).unwrap();

    let fd = fs.open("/docs/readme.txt").unwrap();
    assert_eq!(fs.write(fd, b"hello world").unwrap(), 11);
    fs.seek(fd, 0).unwrap();
    assert_eq!(fs.read(fd, 11).unwrap(), b"hello world".to_vec());
    fs.close(fd).unwrap();

    let stat = fs.stat("docs/readme.txt").unwrap();
    assert_eq!(stat.id, id);
    assert_eq!(stat.kind, DescriptorKind::File);
    assert_eq!(stat.size, 100);
    assert_eq!(stat.blocks.len(), 2);
    assert_eq!(stat.link_count, 1);
    assert!(fs.check_invariants().is_ok());
}

#[test]
fn test_allocation_invariant_across_operations() {
    let mut fs = fs();

    fs.mkdir("a").unwrap();
    fs.create("a/one").unwrap();
    fs.create("two").unwrap();
    fs.truncate("a/one", 300).unwrap();
    fs.truncate("two", 130).unwrap();
    fs.truncate("a/one", 10).unwrap();
    fs.symlink("a/one", "alias").unwrap();
    fs.truncate("two", 700).unwrap();
    fs.link("two", "a/three").unwrap();
    fs.unlink("two").unwrap();
    fs.mkdir("a/b").unwrap();
    fs.rmdir("a/b").unwrap();

    assert!(fs.check_invariants().is_ok());

    let mut owned: Vec<usize> = Vec::new();
    for descriptor in fs.volume().descriptors().iter() {
        owned.extend_from_slice(descriptor.block_map());
    }
    let total = owned.len();
    owned.sort_unstable();
    owned.dedup();
    assert_eq!(owned.len(), total);
    assert_eq!(fs.free_blocks() + total, fs.config().max_blocks);
}

#[test]
fn test_truncate_idempotence() {
    let mut fs = fs();
    fs.create("f").unwrap();

    fs.truncate("f", 150).unwrap();
    let fd = fs.open("f").unwrap();
    fs.write(fd, b"abc").unwrap();
    let first = fs.stat("f").unwrap();

    fs.truncate("f", 150).unwrap();
    assert_eq!(fs.stat("f").unwrap(), first);
    assert_eq!(first.offset, 3);
}

#[test]
fn test_grow_then_read_zero_law() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 16).unwrap();

    let fd = fs.open("f").unwrap();
    fs.write(fd, b"0123456789abcdef").unwrap();

    fs.truncate("f", 4).unwrap();
    fs.truncate("f", 200).unwrap();

    fs.seek(fd, 0).unwrap();
    let content = fs.read(fd, 200).unwrap();
    assert_eq!(&content[..4], b"0123");
    assert!(content[4..].iter().all(|&b| b == 0));
    assert_eq!(content.len(), 200);
}

#[test]
fn test_round_trip_exact_fit() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 5).unwrap();

    let fd = fs.open("f").unwrap();
    assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
    fs.seek(fd, 0).unwrap();
    assert_eq!(fs.read(fd, 5).unwrap(), b"hello".to_vec());
}

#[test]
fn test_write_never_grows_file() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 4).unwrap();

    let fd = fs.open("f").unwrap();
    assert!(matches!(fs.write(fd, b"hello"), Err(FsError::OutOfSpace(_))));

    let stat = fs.stat("f").unwrap();
    assert_eq!(stat.size, 4);
    assert_eq!(stat.offset, 0);
    assert_eq!(fs.read(fd, 4).unwrap(), vec![0; 4]);
}

#[test]
fn test_read_does_not_advance_offset() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 8).unwrap();

    let fd = fs.open("f").unwrap();
    fs.write(fd, b"abcdefgh").unwrap();
    fs.seek(fd, 2).unwrap();

    assert_eq!(fs.read(fd, 3).unwrap(), b"cde".to_vec());
    assert_eq!(fs.read(fd, 3).unwrap(), b"cde".to_vec());
    assert_eq!(fs.read(fd, 100).unwrap(), b"cdefgh".to_vec());
}

#[test]
fn test_handles_share_descriptor_offset() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 8).unwrap();

    let a = fs.open("f").unwrap();
    let b = fs.open("f").unwrap();
    assert_ne!(a, b);

    fs.write(a, b"xy").unwrap();
    assert_eq!(fs.stat("f").unwrap().offset, 2);
    fs.write(b, b"z").unwrap();

    fs.seek(a, 0).unwrap();
    assert_eq!(fs.read(b, 3).unwrap(), b"xyz".to_vec());
}

#[test]
fn test_seek_past_end() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 3).unwrap();
    let fd = fs.open("f").unwrap();

    assert_eq!(
        fs.seek(fd, 4),
        Err(FsError::OffsetOutOfBounds { offset: 4, size: 3 })
    );
    assert!(fs.seek(fd, 3).is_ok());
}

#[test]
fn test_failed_grow_leaves_file_untouched() {
    let mut fs = tight_fs();
    fs.create("f").unwrap();
    let free = fs.free_blocks();

    assert!(matches!(fs.truncate("f", 100), Err(FsError::OutOfSpace(_))));
    assert_eq!(fs.stat("f").unwrap().size, 0);
    assert_eq!(fs.free_blocks(), free);
    assert!(fs.check_invariants().is_ok());
}

#[test]
fn test_link_count_deletion_law() {
    let mut fs = fs();
    let id = fs.create("f").unwrap();
    fs.truncate("f", 100).unwrap();
    let free = fs.free_blocks();

    assert_eq!(fs.link("f", "g"), Ok(2));
    assert_eq!(fs.stat("g").unwrap().id, id);

    assert_eq!(fs.unlink("f"), Ok(UnlinkOutcome::StillLinked(1)));
    assert_eq!(fs.stat("g").unwrap().size, 100);
    assert_eq!(fs.free_blocks(), free);

    assert_eq!(fs.unlink("g"), Ok(UnlinkOutcome::Removed));
    assert_eq!(fs.free_blocks(), free + 2);
    assert!(fs.volume().descriptor(id).is_err());
    assert!(fs.check_invariants().is_ok());
}

#[test]
fn test_unlink_invalidates_open_handles() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.create("keep").unwrap();
    let fd = fs.open("f").unwrap();
    let other = fs.open("keep").unwrap();

    fs.unlink("f").unwrap();

    assert_eq!(fs.read(fd, 1), Err(FsError::InvalidHandle(fd)));
    assert!(fs.read(other, 1).is_ok());
    assert_eq!(fs.open_handles(), 1);
}

#[test]
fn test_unlink_with_remaining_link_keeps_handles() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.link("f", "g").unwrap();
    let fd = fs.open("f").unwrap();

    fs.unlink("f").unwrap();
    assert!(fs.read(fd, 1).is_ok());
}

#[test]
fn test_parent_follows_remaining_link() {
    let mut fs = fs();
    let d = fs.mkdir("d").unwrap();
    let f = fs.create("d/f").unwrap();
    fs.link("d/f", "g").unwrap();

    fs.unlink("d/f").unwrap();
    assert_eq!(fs.stat("g").unwrap().parent, ROOT_ID);

    fs.rmdir("d").unwrap();
    let h = fs.create("h").unwrap();
    assert_eq!(h, d);

    let g = fs.stat("g").unwrap();
    assert_eq!(g.id, f);
    assert_eq!(g.parent, ROOT_ID);
    assert_eq!(fs.stat("h").unwrap().kind, DescriptorKind::File);
    assert!(fs.check_invariants().is_ok());
}

#[test]
fn test_unlink_and_link_reject_directories() {
    let mut fs = fs();
    fs.mkdir("d").unwrap();

    assert!(matches!(fs.unlink("d"), Err(FsError::WrongType(_))));
    assert!(matches!(fs.link("d", "e"), Err(FsError::WrongType(_))));
    assert_eq!(fs.unlink("missing"), Err(FsError::NotFound("missing".to_string())));
}

#[test]
fn test_link_rejects_existing_name() {
    let mut fs = fs();
    fs.create("a").unwrap();
    fs.create("b").unwrap();

    assert_eq!(fs.link("a", "b"), Err(FsError::AlreadyExists("b".to_string())));
    assert_eq!(fs.stat("a").unwrap().link_count, 1);
}

#[test]
fn test_symlink_bound() {
    let mut fs = fs();
    let d = fs.create("d").unwrap();
    fs.symlink("d", "c").unwrap();
    fs.symlink("c", "b").unwrap();
    fs.symlink("b", "a").unwrap();

    // b -> c -> d takes two expansions
    assert_eq!(fs.stat("b").unwrap().id, d);
    // a -> b -> c -> d needs a third
    assert!(matches!(fs.stat("a"), Err(FsError::TooManySymlinks(_))));
    assert!(matches!(fs.open("a"), Err(FsError::TooManySymlinks(_))));
}

#[test]
fn test_symlink_target_length() {
    let mut fs = fs();
    let free = fs.free_blocks();

    let too_long = "x".repeat(33);
    assert_eq!(
        fs.symlink(&too_long, "long"),
        Err(FsError::SymlinkTooLong { len: 33, max: 32 })
    );
    assert_eq!(fs.free_blocks(), free);

    let limit = "y".repeat(32);
    fs.symlink(&limit, "ok").unwrap();
    let stat = fs.lstat("ok").unwrap();
    assert_eq!(stat.kind, DescriptorKind::Symlink);
    assert_eq!(stat.size, 32);

    assert!(matches!(fs.symlink("", "empty"), Err(FsError::InvalidPath(_))));
}

#[test]
fn test_symlink_intermediate_and_final() {
    let mut fs = fs();
    let real = fs.mkdir("real").unwrap();
    fs.symlink("real", "alias").unwrap();

    let f = fs.create("alias/f").unwrap();
    assert_eq!(fs.stat("real/f").unwrap().id, f);
    assert_eq!(fs.stat("alias").unwrap().id, real);
    assert_eq!(fs.lstat("alias").unwrap().kind, DescriptorKind::Symlink);

    fs.cd("alias").unwrap();
    assert_eq!(fs.cwd(), real);
    assert_eq!(fs.pwd().unwrap(), "/real");
}

#[test]
fn test_absolute_symlink_target() {
    let mut fs = fs();
    fs.mkdir("a").unwrap();
    fs.mkdir("a/b").unwrap();
    let target = fs.create("a/b/target").unwrap();
    fs.mkdir("elsewhere").unwrap();
    fs.symlink("/a/b", "elsewhere/jump").unwrap();

    assert_eq!(fs.stat("elsewhere/jump/target").unwrap().id, target);
}

#[test]
fn test_unlink_symlink_leaves_target() {
    let mut fs = fs();
    let f = fs.create("f").unwrap();
    fs.symlink("f", "s").unwrap();

    assert_eq!(fs.unlink("s"), Ok(UnlinkOutcome::Removed));
    assert_eq!(fs.stat("f").unwrap().id, f);
    assert!(fs.check_invariants().is_ok());
}

#[test]
fn test_path_walk() {
    let mut fs = fs();
    let dir = fs.mkdir("dir").unwrap();
    let f = fs.create("dir/f").unwrap();

    let stat = fs.stat("dir/f").unwrap();
    assert_eq!(stat.id, f);
    assert_eq!(stat.parent, dir);

    assert_eq!(
        fs.create("dir/missing/f"),
        Err(FsError::NotFound("missing".to_string()))
    );
    assert_eq!(
        fs.create("dir/f/g"),
        Err(FsError::NotADirectory("f".to_string()))
    );
    assert!(matches!(fs.create("dir//g"), Err(FsError::InvalidPath(_))));
}

#[test]
fn test_directory_bootstrap() {
    let mut fs = fs();
    let parent = fs.mkdir("p").unwrap();
    let child = fs.mkdir("p/c").unwrap();

    let entries = fs.ls("p/c").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].name.as_str(), entries[0].id), (".", child));
    assert_eq!((entries[1].name.as_str(), entries[1].id), ("..", parent));
    assert!(entries.iter().all(|e| e.kind == DescriptorKind::Directory));

    let root = fs.ls("/").unwrap();
    assert_eq!((root[0].name.as_str(), root[0].id), (".", ROOT_ID));
    assert_eq!((root[1].name.as_str(), root[1].id), ("..", ROOT_ID));

    let stat = fs.stat("p/c").unwrap();
    assert_eq!(stat.size, fs.config().dir_default_size);
    assert_eq!(stat.link_count, 1);
}

#[test]
fn test_ls_reports_kinds() {
    let mut fs = fs();
    fs.create("file").unwrap();
    fs.mkdir("dir").unwrap();
    fs.symlink("file", "link").unwrap();

    let kinds: Vec<(String, DescriptorKind)> = fs
        .ls(".")
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.kind))
        .collect();
    assert!(kinds.contains(&("file".to_string(), DescriptorKind::File)));
    assert!(kinds.contains(&("dir".to_string(), DescriptorKind::Directory)));
    assert!(kinds.contains(&("link".to_string(), DescriptorKind::Symlink)));

    assert!(matches!(fs.ls("file"), Err(FsError::NotADirectory(_))));
}

#[test]
fn test_cd_and_pwd() {
    let mut fs = fs();
    fs.mkdir("a").unwrap();
    fs.mkdir("a/b").unwrap();

    fs.cd("a/b").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/a/b");

    fs.create("here").unwrap();
    assert!(fs.stat("/a/b/here").is_ok());

    fs.cd("..").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/a");
    fs.cd(".").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/a");
    fs.cd("/").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/");
    fs.cd("..").unwrap();
    assert_eq!(fs.cwd(), ROOT_ID);

    fs.create("plain").unwrap();
    assert!(matches!(fs.cd("plain"), Err(FsError::NotADirectory(_))));
    assert!(matches!(fs.cd("nowhere"), Err(FsError::NotFound(_))));
}

#[test]
fn test_rmdir_rules() {
    let mut fs = fs();
    let free = fs.free_blocks();

    fs.mkdir("full").unwrap();
    fs.create("full/f").unwrap();
    assert_eq!(
        fs.rmdir("full"),
        Err(FsError::DirectoryNotEmpty("full".to_string()))
    );

    fs.create("file").unwrap();
    assert_eq!(fs.rmdir("file"), Err(FsError::NotADirectory("file".to_string())));

    fs.mkdir("busy").unwrap();
    fs.cd("busy").unwrap();
    assert!(matches!(fs.rmdir("/busy"), Err(FsError::Busy(_))));
    assert!(matches!(fs.rmdir("."), Err(FsError::InvalidName(_))));
    fs.cd("/").unwrap();
    assert!(matches!(fs.rmdir("/"), Err(FsError::Busy(_))));

    fs.rmdir("busy").unwrap();
    fs.unlink("full/f").unwrap();
    fs.rmdir("full").unwrap();
    fs.unlink("file").unwrap();

    assert_eq!(fs.free_blocks(), free);
    assert_eq!(fs.ls("/").unwrap().len(), 2);
    assert!(fs.check_invariants().is_ok());
}

#[test]
fn test_duplicate_and_invalid_names() {
    let mut fs = fs();
    fs.create("x").unwrap();

    assert_eq!(fs.create("x"), Err(FsError::AlreadyExists("x".to_string())));
    assert_eq!(fs.mkdir("x"), Err(FsError::AlreadyExists("x".to_string())));
    assert_eq!(fs.create("a@1"), Err(FsError::InvalidName("a@1".to_string())));
    assert_eq!(fs.mkdir(".."), Err(FsError::InvalidName("..".to_string())));
}

#[test]
fn test_directory_capacity() {
    // ".@0/..@0/" leaves 7 bytes: one "a@1/" record fits, a second does not
    let mut fs = FileSystem::new(FsConfig {
        dir_default_size: 16,
        max_descriptors: 8,
        ..FsConfig::default()
    })
    .unwrap();

    fs.create("a").unwrap();
    assert!(matches!(fs.create("b"), Err(FsError::OutOfSpace(_))));
    assert!(fs.check_invariants().is_ok());

    fs.unlink("a").unwrap();
    fs.create("b").unwrap();
}

#[test]
fn test_open_table_exhaustion() {
    let mut fs = FileSystem::new(FsConfig {
        max_open_files: 2,
        ..FsConfig::default()
    })
    .unwrap();
    fs.create("f").unwrap();

    assert_eq!(fs.open("f"), Ok(Fd::new(0)));
    assert_eq!(fs.open("f"), Ok(Fd::new(1)));
    assert_eq!(fs.open("f"), Err(FsError::NoFreeHandles));

    fs.close(Fd::new(0)).unwrap();
    assert_eq!(fs.open("f"), Ok(Fd::new(0)));
    assert_eq!(fs.close(Fd::new(7)), Err(FsError::InvalidHandle(Fd::new(7))));
}

#[test]
fn test_stat_serializes() {
    let mut fs = fs();
    fs.create("f").unwrap();
    fs.truncate("f", 10).unwrap();

    let value = serde_json::to_value(fs.stat("f").unwrap()).unwrap();
    assert_eq!(value["kind"], "file");
    assert_eq!(value["size"], 10);
    assert_eq!(value["link_count"], 1);
    assert!(value["blocks"].is_array());

    let text = fs.stat("f").unwrap().to_string();
    assert!(text.starts_with("type:   file"));
}

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "block_size": 16, "max_blocks": 64, "dir_default_size": 128, "min_log_level": "debug" }}"#
    )
    .unwrap();

    let fs = FileSystem::from_config_file(file.path()).unwrap();
    assert_eq!(fs.config().block_size, 16);
    assert_eq!(fs.stat("/").unwrap().blocks.len(), 8);
    assert_eq!(fs.free_blocks(), 56);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = FileSystem::from_config_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(FsError::Config(_))));
}

#[test]
fn test_events_record_operations() {
    let mut fs = FileSystem::new(FsConfig {
        min_log_level: LogLevel::Info,
        ..FsConfig::default()
    })
    .unwrap();

    fs.mkdir("d").unwrap();
    fs.create("d/f").unwrap();
    let fd = fs.open("d/f").unwrap();
    fs.close(fd).unwrap();
    assert!(fs.rmdir("d").is_err());

    let messages: Vec<&str> = fs.events().entries().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["mounted", "mkdir", "create", "rmdir"]);

    let last = fs.events().last().unwrap();
    assert_eq!(last.level, LogLevel::Warn);
    assert!(last.field("error").is_some());
    assert!(fs
        .events()
        .entries()
        .all(|e| e.source == Some(fs.instance_id())));
}
