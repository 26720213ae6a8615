use memmap2::Mmap;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::storage::FileEntry;

/// Walk a directory tree and collect every regular file with its path relative to `root`.
/// Paths use forward slashes so they line up with storage keys on every platform.
pub fn walk_files(root: &Path) -> io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let Some(relative_str) = relative.to_str() else {
            // Non-UTF8 names cannot be expressed as storage keys.
            continue;
        };

        let size = entry.metadata().map_err(io::Error::from)?.len();
        entries.push(FileEntry {
            name: relative_str.replace('\\', "/"),
            size,
        });
    }

    Ok(entries)
}

/// Read a whole file through a read-only memory map.
///
/// Empty files are returned without mapping, since zero-length mappings are
/// rejected on some platforms.
pub fn read_mapped(path: &Path) -> io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: The mapping is read-only and copied out before it is dropped.
    // Callers must not truncate the file concurrently.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap.to_vec())
}

/// Compute the BLAKE3 hash of a byte slice as lowercase hex.
pub fn hash_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_files_reports_relative_sorted_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), b"a").unwrap();

        let entries = walk_files(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "sub/a.txt"]);
        assert_eq!(entries[0].size, 2);
    }

    #[test]
    fn test_read_mapped_empty_and_full() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"content").unwrap();
        assert!(read_mapped(&empty).unwrap().is_empty());
        assert_eq!(read_mapped(&full).unwrap(), b"content");
    }

    #[test]
    fn test_hash_hex_is_stable() {
        assert_eq!(hash_hex(b"abc"), hash_hex(b"abc"));
        assert_ne!(hash_hex(b"abc"), hash_hex(b"abd"));
        assert_eq!(hash_hex(b"").len(), 64);
    }
}
