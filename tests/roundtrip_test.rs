mod common;

use std::fs;
use std::path::Path;

use tarfacade::Config;

use common::{ENGINES, enter, entry_names, open, sample_tree};

#[test]
fn test_create_and_extract_plain_tar() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let files = sample_tree(&src);
        let tar_path = dir.path().join("out.tar");

        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(&files, false).unwrap();
        }

        assert_eq!(entry_names(&tar_path), vec!["a.txt", "sub", "sub/b.txt"], "{kind}");

        let dest = dir.path().join("dest");
        archive.extract(&dest).unwrap();
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hello");
        assert!(dest.join("sub").is_dir());
        assert_eq!(fs::read(dest.join("sub/b.txt")).unwrap(), b"nested");
    }
}

#[test]
fn test_file_and_empty_directory_without_gzip() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.txt"), b"hi").unwrap();
        let tar_path = dir.path().join("x.tar");

        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(["a.txt", "sub"], false).unwrap();
        }

        let bytes = fs::read(&tar_path).unwrap();
        assert_ne!(&bytes[..2], &[0x1f, 0x8b], "{kind}");

        let out = dir.path().join("out");
        archive.extract(&out).unwrap();
        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"hi", "{kind}");
        assert!(out.join("sub").is_dir(), "{kind}");
        assert_eq!(fs::read_dir(out.join("sub")).unwrap().count(), 0, "{kind}");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 2, "{kind}");
    }
}

#[cfg(unix)]
#[test]
fn test_backslash_in_name_survives_roundtrip() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a\\b.txt"), b"one file").unwrap();
        let tar_path = dir.path().join("names.tar");

        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(["a\\b.txt"], false).unwrap();
        }

        assert_eq!(entry_names(&tar_path), vec!["a\\b.txt"], "{kind}");

        let dest = dir.path().join("dest");
        archive.extract(&dest).unwrap();
        assert!(dest.join("a\\b.txt").is_file(), "{kind}");
        assert!(!dest.join("a").exists(), "{kind}");
        assert_eq!(fs::read(dest.join("a\\b.txt")).unwrap(), b"one file");
    }
}

#[test]
fn test_gzip_archive_starts_with_magic() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let files = sample_tree(&src);
        let tgz = dir.path().join("out.tar.gz");

        let Some(archive) = open(&tgz, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(&files, true).unwrap();
        }

        let bytes = fs::read(&tgz).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b], "{kind}");

        let dest = dir.path().join("dest");
        archive.extract(&dest).unwrap();
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(dest.join("sub/b.txt")).unwrap(), b"nested");
    }
}

#[test]
fn test_engines_read_each_others_archives() {
    if tarfacade::try_load_native(Path::new("probe.tar"), &Config::default()).is_none() {
        return;
    }

    for (writer, reader) in [(ENGINES[0], ENGINES[1]), (ENGINES[1], ENGINES[0])] {
        for gzip in [false, true] {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            let files = sample_tree(&src);
            let path = dir.path().join("shared.tar");

            {
                let _cwd = enter(&src);
                open(&path, writer).unwrap().create(&files, gzip).unwrap();
            }

            let dest = dir.path().join("dest");
            open(&path, reader).unwrap().extract(&dest).unwrap();
            assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hello", "{writer} -> {reader}");
            assert_eq!(fs::read(dest.join("sub/b.txt")).unwrap(), b"nested");
        }
    }
}

#[test]
fn test_create_replaces_existing_archive() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        sample_tree(&src);
        let tar_path = dir.path().join("out.tar");
        fs::write(&tar_path, b"stale contents that are not a tar").unwrap();

        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(["a.txt"], false).unwrap();
        }

        assert_eq!(entry_names(&tar_path), vec!["a.txt"], "{kind}");
    }
}

#[test]
fn test_directories_are_not_recursed() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        sample_tree(&src);
        let tar_path = dir.path().join("out.tar");

        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(["sub"], false).unwrap();
        }

        assert_eq!(entry_names(&tar_path), vec!["sub"], "{kind}");
    }
}

#[cfg(unix)]
#[test]
fn test_permissions_are_restored() {
    use std::os::unix::fs::PermissionsExt;

    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let files = sample_tree(&src);
        fs::write(src.join("run.sh"), b"#!/bin/sh\n").unwrap();
        fs::set_permissions(src.join("run.sh"), fs::Permissions::from_mode(0o750)).unwrap();
        fs::set_permissions(src.join("a.txt"), fs::Permissions::from_mode(0o640)).unwrap();
        fs::set_permissions(src.join("sub"), fs::Permissions::from_mode(0o750)).unwrap();

        let tar_path = dir.path().join("perms.tar");
        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            let mut files = files.clone();
            files.push("run.sh");
            archive.create(&files, false).unwrap();
        }

        let dest = dir.path().join("dest");
        archive.extract(&dest).unwrap();

        let mode = |p: &str| fs::metadata(dest.join(p)).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode("run.sh"), 0o750, "{kind}");
        assert_eq!(mode("a.txt"), 0o640, "{kind}");
        assert_eq!(mode("sub"), 0o750, "{kind}");
    }
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_stored_not_followed() {
    for kind in ENGINES {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        sample_tree(&src);
        std::os::unix::fs::symlink("a.txt", src.join("alias")).unwrap();

        let tar_path = dir.path().join("links.tar");
        let Some(archive) = open(&tar_path, kind) else {
            continue;
        };
        {
            let _cwd = enter(&src);
            archive.create(["a.txt", "alias"], false).unwrap();
        }

        let dest = dir.path().join("dest");
        archive.extract(&dest).unwrap();
        let link = dest.join("alias");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink(), "{kind}");
        assert_eq!(fs::read_link(&link).unwrap(), std::path::PathBuf::from("a.txt"));
        assert_eq!(fs::read(&link).unwrap(), b"hello");
    }
}
