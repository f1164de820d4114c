use thiserror::Error;

/// Errors surfaced while opening or flushing a store.
///
/// These are the only recoverable failures. Lookups report missing keys
/// through their return values, and an OS failure in the middle of an
/// operation (growing or mapping the file) aborts the process, since the
/// engine has no way to undo a half-applied structural change.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be opened or synced.
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
}
