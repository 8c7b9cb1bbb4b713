use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};

/// Owns the store for the lifetime of the process: opened once at startup,
/// closed at shutdown. Operations borrow `db` and lock per call.
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Opens (creating if needed) the database at `db_path` and applies
    /// pending migrations.
    pub fn open(db_path: PathBuf) -> Result<Self> {
        tracing::info!(path = %db_path.display(), "opening store");
        Ok(Self::new(Database::new(db_path)?))
    }

    /// Closes the underlying connection. Fails while any operation still
    /// holds a handle to the store.
    pub fn close(self) -> Result<()> {
        let mutex = Arc::try_unwrap(self.db)
            .map_err(|_| Error::InvalidOperation("store is still in use".to_string()))?;
        let db = mutex.into_inner().map_err(|_| Error::Lock)?;
        db.close()
    }
}
