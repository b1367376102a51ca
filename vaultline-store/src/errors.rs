//! Errors produced by the encrypted store.

/// Everything that can go wrong opening or operating on a [`crate::Store`].
#[derive(Debug)]
pub enum StoreError {
    /// The store file exists but the supplied password doesn't unseal its
    /// host-id marker: either the password is wrong or the file was tampered
    /// with.
    WrongPassword,
    /// A caller tried to reference a conversation that doesn't exist.
    Invariant(&'static str),
    /// The underlying SQLite connection or a query against it failed.
    Sqlite(rusqlite::Error),
    /// A sealed blob failed to open (wrong key or corrupted data).
    Seal(vaultline_crypto::SealError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<vaultline_crypto::SealError> for StoreError {
    fn from(e: vaultline_crypto::SealError) -> Self {
        StoreError::Seal(e)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongPassword => write!(f, "wrong password, or the store has been tampered with"),
            Self::Invariant(what) => write!(f, "store invariant violated: {what}"),
            Self::Sqlite(e) => write!(f, "sqlite error: {e}"),
            Self::Seal(e) => write!(f, "failed to open a sealed value: {e}"),
        }
    }
}
impl std::error::Error for StoreError {}
