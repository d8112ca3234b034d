//! Synthetic forcing frames and on-disk input trees.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use tempfile::TempDir;

/// A frame of `shape` (variables, rows, columns) where every cell equals
/// `value`.
///
/// # Example
///
/// ```
/// use test_utils::constant_frame;
///
/// let frame = constant_frame([8, 3, 4], 2.5);
/// assert_eq!(frame[[7, 2, 3]], 2.5);
/// ```
pub fn constant_frame(shape: [usize; 3], value: f64) -> Array3<f64> {
    Array3::from_elem(shape, value)
}

/// A temporary input directory that files can be dropped into.
pub struct InputTree {
    dir: TempDir,
}

impl InputTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file at `relative`, including parent directories.
    pub fn touch(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&path, b"").expect("failed to create file");
        path
    }
}

impl Default for InputTree {
    fn default() -> Self {
        Self::new()
    }
}
