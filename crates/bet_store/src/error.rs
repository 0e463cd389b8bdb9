use rusqlite::ffi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique constraint hit — the row already exists.
    #[error("duplicate {entity}")]
    Duplicate { entity: &'static str },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Stored text that does not parse back (decimal, outcome, timestamp).
    #[error("corrupt value in {column}: {value:?}")]
    CorruptValue { column: &'static str, value: String },

    /// Payout or credited balance does not fit a `Decimal`.
    #[error("amount overflow settling bet {bet_id}")]
    Overflow { bet_id: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Map a raw sqlite error, turning UNIQUE / PRIMARY KEY violations into
    /// `Duplicate`.
    pub fn from_insert(entity: &'static str, err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StoreError::Duplicate { entity }
            }
            _ => StoreError::Sqlite(err),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }

    /// The store itself is unusable; the pass must stop and retry later.
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::Io(_) => true,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::DatabaseCorrupt
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DiskFull
                    | rusqlite::ErrorCode::ReadOnly
                    | rusqlite::ErrorCode::PermissionDenied
            ),
            _ => false,
        }
    }
}
