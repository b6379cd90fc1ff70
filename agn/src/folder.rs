//! Tile file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use crate::Error;
use crate::tiles::TILE_EXTENSION;

/// Get all tile files in a directory, sorted by path.
///
/// Subdirectories are not searched.
pub fn tile_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if is_tile_file(&path) {
            files.push(path);
        }
    }

    files.sort_unstable();

    Ok(files)
}

/// Check if a path has the tile file extension.
pub fn is_tile_file(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case(TILE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_tiles() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.agn", "a.AGN", "notes.txt", "agn", "c.agn.bak"] {
            fs::write(dir.path().join(name), []).unwrap();
        }
        fs::create_dir(dir.path().join("nested.agn")).unwrap();
        fs::write(dir.path().join("nested.agn").join("d.agn"), []).unwrap();

        let files = tile_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.AGN"), dir.path().join("b.agn")]);
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(tile_files(dir.path().join("missing")), Err(Error::Io(_))));
    }
}
