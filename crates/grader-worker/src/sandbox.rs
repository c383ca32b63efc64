//! Materializes envelope contents into the worker's exercise directory.
//!
//! Paths arriving in an envelope are untrusted. Resolution is purely
//! lexical: `.` components drop out, `..` pops within the written tree, and
//! anything that would step outside the root (absolute paths, leading `..`)
//! is clamped to its basename inside the root. No symlinks are followed and
//! no filesystem state is consulted to decide the target.

use std::io;
use std::path::{Component, Path, PathBuf};

use grader_protocol::RemoteEnvelope;

/// Reduce an untrusted path to the relative path it occupies inside the
/// box. Both file writes and the argv handed to the test driver must go
/// through this, or a clamped file would be written under one name and
/// looked up under another.
pub fn clamp_relative(requested: &str) -> PathBuf {
    let requested = Path::new(requested);
    let mut clean = PathBuf::new();
    let mut escaped = false;

    for component in requested.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    escaped = true;
                }
            }
            Component::RootDir | Component::Prefix(_) => escaped = true,
        }
    }

    if escaped || clean.as_os_str().is_empty() {
        return requested
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("file"));
    }
    clean
}

/// Resolve an untrusted relative path against `root`.
pub fn resolve_within(root: &Path, requested: &str) -> PathBuf {
    root.join(clamp_relative(requested))
}

/// Write one untrusted file under `root`, creating parent directories.
pub fn write_file(root: &Path, requested: &str, content: &str) -> io::Result<PathBuf> {
    let target = resolve_within(root, requested);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, content)?;
    Ok(target)
}

/// Write the envelope's source and every test file under `root`. The
/// source's file name comes from the worker's own exercise configuration,
/// never from the envelope.
pub fn materialize(root: &Path, source_name: &str, envelope: &RemoteEnvelope) -> io::Result<()> {
    write_file(root, source_name, &envelope.source)?;
    for command in &envelope.commands {
        for test in &command.tests {
            write_file(root, &test.path, &test.content)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_stay_relative() {
        let root = Path::new("/box");
        assert_eq!(
            resolve_within(root, "tests/001.txt"),
            PathBuf::from("/box/tests/001.txt")
        );
        assert_eq!(
            resolve_within(root, "./tests/./001.txt"),
            PathBuf::from("/box/tests/001.txt")
        );
    }

    #[test]
    fn inner_parent_components_resolve_lexically() {
        let root = Path::new("/box");
        assert_eq!(
            resolve_within(root, "tests/../tests/001.txt"),
            PathBuf::from("/box/tests/001.txt")
        );
    }

    #[test]
    fn escapes_clamp_to_the_basename() {
        let root = Path::new("/box");
        assert_eq!(
            resolve_within(root, "../../etc/passwd"),
            PathBuf::from("/box/passwd")
        );
        assert_eq!(
            resolve_within(root, "/etc/passwd"),
            PathBuf::from("/box/passwd")
        );
        assert_eq!(
            resolve_within(root, "tests/../../001.txt"),
            PathBuf::from("/box/001.txt")
        );
    }

    #[test]
    fn degenerate_paths_get_a_placeholder_name() {
        let root = Path::new("/box");
        assert_eq!(resolve_within(root, ".."), PathBuf::from("/box/file"));
        assert_eq!(resolve_within(root, "."), PathBuf::from("/box/file"));
    }

    #[test]
    fn clamped_names_match_what_resolution_writes() {
        for requested in ["tests/001.txt", "../../etc/passwd", "/abs/002.txt", "a/../b"] {
            assert_eq!(
                resolve_within(Path::new("/box"), requested),
                Path::new("/box").join(clamp_relative(requested))
            );
        }
        assert_eq!(
            clamp_relative("../outside/escape.txt"),
            PathBuf::from("escape.txt")
        );
    }

    #[test]
    fn write_file_creates_parents_and_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_file(dir.path(), "tests/deep/001.txt", "timeout 2\npayload\n").unwrap();
        assert!(written.starts_with(dir.path()));
        assert_eq!(
            std::fs::read_to_string(written).unwrap(),
            "timeout 2\npayload\n"
        );
    }
}
