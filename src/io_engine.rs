//! The backing file and its growth discipline.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
};

/// Owns the store's single backing file. Blocks are carved from it by
/// truncation-driven growth and materialized through the block cache.
pub struct PagedFile {
    file: File,
}

impl PagedFile {
    pub fn open(path: &Path) -> io::Result<PagedFile> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        Ok(PagedFile { file })
    }

    /// Current file length. Stat failure is fatal: the store cannot reason
    /// about a file it cannot measure.
    pub fn len(&self) -> u64 {
        self.file
            .metadata()
            .unwrap_or_else(|e| panic!("stat store file: {e}"))
            .len()
    }

    /// Grow the file to at least `need` bytes. Never shrinks. Newly exposed
    /// bytes read as zero.
    pub fn ensure_len(&self, need: u64) {
        if self.len() < need {
            self.file
                .set_len(need)
                .unwrap_or_else(|e| panic!("grow store file to {need} bytes: {e}"));
        }
    }

    pub(crate) fn raw(&self) -> &File {
        &self.file
    }
}
