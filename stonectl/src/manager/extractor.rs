//! Streaming tar extraction.
//!
//! Entries are read one at a time from any [`Read`] source and written under a
//! destination root. Existing regular files are replaced, never merged, so
//! extracting the same archive twice yields the same tree. Entries are
//! refused when their path, or a symlink already on disk along it, leads
//! outside the root.

use std::fs;
use std::io::{self, Read};
use std::path::{Component as PathComponent, Path, PathBuf};

use tar::{Archive, EntryType};
use tracing::debug;

use super::error::ExtractError;

/// Summary of a completed extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Number of entries materialized.
    pub entries: usize,
    /// Total bytes of regular file content written.
    pub bytes: u64,
}

/// Tar extractor with overwrite semantics.
#[derive(Debug)]
pub struct ArchiveExtractor {
    preserve_permissions: bool,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractor {
    /// Create an extractor that keeps entry permission bits.
    pub fn new() -> Self {
        Self {
            preserve_permissions: true,
        }
    }

    /// Extract all entries of `source` under `root`.
    pub fn extract<R: Read>(&self, source: R, root: &Path) -> Result<ExtractSummary, ExtractError> {
        self.extract_with(source, root, |_| {})
    }

    /// Extract all entries, calling `on_entry` with each target path before
    /// it is written.
    pub fn extract_with<R, F>(
        &self,
        source: R,
        root: &Path,
        mut on_entry: F,
    ) -> Result<ExtractSummary, ExtractError>
    where
        R: Read,
        F: FnMut(&Path),
    {
        fs::create_dir_all(root).map_err(|e| ExtractError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let real_root = root.canonicalize().map_err(|e| ExtractError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut archive = Archive::new(source);
        archive.set_preserve_permissions(self.preserve_permissions);
        archive.set_overwrite(true);

        let mut summary = ExtractSummary::default();
        let entries = archive.entries().map_err(ExtractError::Malformed)?;

        for entry in entries {
            let mut entry = entry.map_err(ExtractError::Malformed)?;
            let relative = entry.path().map_err(ExtractError::Malformed)?.into_owned();
            let target = resolve_target(root, &relative)?;
            let entry_type = entry.header().entry_type();
            if target.as_path() == root {
                // `./` entry of an archive made from inside its directory
                continue;
            }

            if entry_type == EntryType::Link {
                let link = entry
                    .link_name()
                    .map_err(ExtractError::Malformed)?
                    .ok_or_else(|| ExtractError::UnsafePath {
                        path: relative.clone(),
                    })?;
                let original = resolve_target(root, &link)?;
                ensure_inside(&real_root, &original, &link)?;
            }
            ensure_inside(&real_root, &target, &relative)?;

            on_entry(&target);
            remove_existing(&target)?;

            let unpacked = entry.unpack_in(root).map_err(|e| ExtractError::Io {
                path: target.clone(),
                source: e,
            })?;
            if !unpacked {
                return Err(ExtractError::UnsafePath { path: relative });
            }

            if entry_type.is_file() {
                summary.bytes += entry.size();
            }
            summary.entries += 1;
        }

        debug!(
            root = %root.display(),
            entries = summary.entries,
            bytes = summary.bytes,
            "Archive extracted"
        );
        Ok(summary)
    }
}

/// Join an entry path onto `root`, refusing anything that could escape it.
fn resolve_target(root: &Path, relative: &Path) -> Result<PathBuf, ExtractError> {
    let mut target = root.to_path_buf();
    for part in relative.components() {
        match part {
            PathComponent::Normal(segment) => target.push(segment),
            PathComponent::CurDir => {}
            PathComponent::ParentDir | PathComponent::RootDir | PathComponent::Prefix(_) => {
                return Err(ExtractError::UnsafePath {
                    path: relative.to_path_buf(),
                });
            }
        }
    }
    Ok(target)
}

/// Refuse `target` when its nearest existing ancestor resolves outside
/// `real_root`. A dangling symlink along the way is refused too.
fn ensure_inside(real_root: &Path, target: &Path, relative: &Path) -> Result<(), ExtractError> {
    let unsafe_path = || ExtractError::UnsafePath {
        path: relative.to_path_buf(),
    };

    let mut ancestor = target.parent();
    while let Some(dir) = ancestor {
        match dir.canonicalize() {
            Ok(real) if real.starts_with(real_root) => return Ok(()),
            Ok(_) => return Err(unsafe_path()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(dir).is_ok() {
                    return Err(unsafe_path());
                }
                ancestor = dir.parent();
            }
            Err(e) => {
                return Err(ExtractError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                });
            }
        }
    }
    Err(unsafe_path())
}

/// Delete a file or symlink occupying `target`. Directories are left alone.
fn remove_existing(target: &Path) -> Result<(), ExtractError> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(target).map_err(|e| ExtractError::Io {
            path: target.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Build an in-memory tar with the given regular files.
    fn build_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Write a raw header with an arbitrary path, bypassing the builder's checks.
    fn raw_entry(path: &str, data: &[u8]) -> Vec<u8> {
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();

        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(data);
        let padding = (512 - data.len() % 512) % 512;
        out.extend(std::iter::repeat(0u8).take(padding));
        out.extend(std::iter::repeat(0u8).take(1024));
        out
    }

    #[test]
    fn test_extract_reproduces_tree() {
        let temp = TempDir::new().unwrap();
        let archive = build_tar(&[
            ("run/app", b"#!/bin/sh\necho app\n"),
            ("run/lib.so", b"\x7fELF library"),
            ("etc/config.ini", b"[server]\n"),
        ]);

        let summary = ArchiveExtractor::new()
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert_eq!(summary.entries, 3);
        assert_eq!(
            fs::read(temp.path().join("run/app")).unwrap(),
            b"#!/bin/sh\necho app\n"
        );
        assert_eq!(
            fs::read(temp.path().join("run/lib.so")).unwrap(),
            b"\x7fELF library"
        );
        assert_eq!(
            fs::read(temp.path().join("etc/config.ini")).unwrap(),
            b"[server]\n"
        );
    }

    #[test]
    fn test_extract_overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("run")).unwrap();
        fs::write(temp.path().join("run/app"), b"old version with longer content").unwrap();

        let archive = build_tar(&[("run/app", b"new")]);
        ArchiveExtractor::new()
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert_eq!(fs::read(temp.path().join("run/app")).unwrap(), b"new");
    }

    #[test]
    fn test_extract_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let archive = build_tar(&[("a/b/c.txt", b"ccc"), ("a/d.txt", b"dd")]);
        let extractor = ArchiveExtractor::new();

        extractor
            .extract(Cursor::new(archive.clone()), temp.path())
            .unwrap();
        extractor
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert_eq!(fs::read(temp.path().join("a/b/c.txt")).unwrap(), b"ccc");
        assert_eq!(fs::read(temp.path().join("a/d.txt")).unwrap(), b"dd");
        let top: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_extract_reports_entries_in_order() {
        let temp = TempDir::new().unwrap();
        let archive = build_tar(&[("first", b"1"), ("second", b"2")]);
        let mut seen = Vec::new();

        ArchiveExtractor::new()
            .extract_with(Cursor::new(archive), temp.path(), |path| {
                seen.push(path.to_path_buf())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![temp.path().join("first"), temp.path().join("second")]
        );
    }

    #[test]
    fn test_extract_directory_entries() {
        let temp = TempDir::new().unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, "libs/", std::io::empty())
            .unwrap();
        let archive = builder.into_inner().unwrap();

        // Pre-existing directory is accepted
        fs::create_dir_all(temp.path().join("libs")).unwrap();
        ArchiveExtractor::new()
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert!(temp.path().join("libs").is_dir());
    }

    #[test]
    fn test_extract_rejects_parent_dir_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(&root).unwrap();

        let result = ArchiveExtractor::new().extract(Cursor::new(raw_entry("../evil", b"x")), &root);

        assert!(matches!(result, Err(ExtractError::UnsafePath { .. })));
        assert!(!temp.path().join("evil").exists());
    }

    /// Symlink entry `name` pointing at `target`.
    fn symlink_entry(builder: &mut tar::Builder<Vec<u8>>, name: &str, target: &Path) {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(EntryType::Symlink);
        builder.append_link(&mut header, name, target).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_rejects_writes_through_symlinked_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let outside = temp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        symlink_entry(&mut builder, "run", &outside);
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder
            .append_data(&mut header, "run/evil", &b"evil"[..])
            .unwrap();
        let archive = builder.into_inner().unwrap();

        let result = ArchiveExtractor::new().extract(Cursor::new(archive), &root);

        assert!(matches!(
            result,
            Err(ExtractError::UnsafePath { ref path }) if path == Path::new("run/evil")
        ));
        assert!(!outside.join("evil").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_rejects_symlink_already_on_disk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let outside = temp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(outside.join("lib")).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("run")).unwrap();

        let result = ArchiveExtractor::new()
            .extract(Cursor::new(build_tar(&[("run/lib/x.so", b"x")])), &root);

        assert!(matches!(result, Err(ExtractError::UnsafePath { .. })));
        assert!(!outside.join("lib/x.so").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_replaces_symlink_with_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let outside = temp.path().join("outside.txt");
        fs::create_dir_all(&root).unwrap();
        fs::write(&outside, b"keep").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("stone")).unwrap();

        ArchiveExtractor::new()
            .extract(Cursor::new(build_tar(&[("stone", b"new")])), &root)
            .unwrap();

        assert_eq!(fs::read(&outside).unwrap(), b"keep");
        assert_eq!(fs::read(root.join("stone")).unwrap(), b"new");
        assert!(!fs::symlink_metadata(root.join("stone"))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_keeps_symlinks_inside_root() {
        let temp = TempDir::new().unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder
            .append_data(&mut header, "lib/real/a.so", &b"aaa"[..])
            .unwrap();
        symlink_entry(&mut builder, "lib/current", Path::new("real"));
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder
            .append_data(&mut header, "lib/current/b.so", &b"bbb"[..])
            .unwrap();
        let archive = builder.into_inner().unwrap();

        let summary = ArchiveExtractor::new()
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert_eq!(summary.entries, 3);
        assert_eq!(fs::read(temp.path().join("lib/real/b.so")).unwrap(), b"bbb");
    }

    #[test]
    fn test_extract_skips_root_entry() {
        let temp = TempDir::new().unwrap();
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..2].copy_from_slice(b"./");
        header.set_size(0);
        header.set_mode(0o755);
        header.set_entry_type(EntryType::Directory);
        header.set_cksum();
        let mut archive = header.as_bytes().to_vec();
        archive.extend(raw_entry("./stone", b"ok"));

        let summary = ArchiveExtractor::new()
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert_eq!(summary.entries, 1);
        assert_eq!(fs::read(temp.path().join("stone")).unwrap(), b"ok");
    }

    #[test]
    fn test_default_preserves_permissions() {
        assert!(ArchiveExtractor::default().preserve_permissions);
    }

    #[test]
    fn test_extract_ignores_current_dir_segments() {
        let temp = TempDir::new().unwrap();
        ArchiveExtractor::new()
            .extract(Cursor::new(raw_entry("./run/stone", b"bin")), temp.path())
            .unwrap();
        assert_eq!(fs::read(temp.path().join("run/stone")).unwrap(), b"bin");
    }

    #[test]
    fn test_extract_garbage_is_malformed() {
        let temp = TempDir::new().unwrap();
        let garbage = vec![b'x'; 1024];

        let result = ArchiveExtractor::new().extract(Cursor::new(garbage), temp.path());

        assert!(matches!(result, Err(ExtractError::Malformed(_))));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extract_truncated_entry_fails() {
        let temp = TempDir::new().unwrap();
        let mut archive = build_tar(&[("big.bin", &[9u8; 4096])]);
        archive.truncate(512 + 1000);

        let result = ArchiveExtractor::new().extract(Cursor::new(archive), temp.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_empty_source_is_ok() {
        let temp = TempDir::new().unwrap();
        let summary = ArchiveExtractor::new()
            .extract(Cursor::new(Vec::new()), temp.path())
            .unwrap();
        assert_eq!(summary, ExtractSummary::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_hard_link_resolves_under_root() {
        let temp = TempDir::new().unwrap();
        let mut builder = tar::Builder::new(Vec::new());

        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder
            .append_data(&mut header, "bin/stone", &b"data"[..])
            .unwrap();

        let mut link = tar::Header::new_gnu();
        link.set_size(0);
        link.set_entry_type(EntryType::Link);
        builder
            .append_link(&mut link, "bin/stone-link", "bin/stone")
            .unwrap();
        let archive = builder.into_inner().unwrap();

        ArchiveExtractor::new()
            .extract(Cursor::new(archive), temp.path())
            .unwrap();

        assert_eq!(fs::read(temp.path().join("bin/stone-link")).unwrap(), b"data");
    }

    #[test]
    fn test_resolve_target_rejects_absolute() {
        let err = resolve_target(Path::new("/install"), Path::new("/etc/passwd")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath { .. }));
    }
}
