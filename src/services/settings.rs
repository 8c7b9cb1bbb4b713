use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};

/// Settings are read on demand; nothing is cached between calls.
pub async fn get_setting(db: &Arc<Mutex<Database>>, key: &str) -> Result<Option<String>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.get_setting(key)
}

pub async fn set_setting(db: &Arc<Mutex<Database>>, key: &str, value: &str) -> Result<()> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.set_setting(key, value)
}

pub async fn get_settings(db: &Arc<Mutex<Database>>) -> Result<BTreeMap<String, String>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.get_settings()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn set_overwrites_and_reads_back() {
        let db = test_db();
        assert_eq!(
            get_setting(&db, "currency").await.unwrap().as_deref(),
            Some("USD")
        );
        set_setting(&db, "currency", "EUR").await.unwrap();
        assert_eq!(
            get_setting(&db, "currency").await.unwrap().as_deref(),
            Some("EUR")
        );
    }

    #[tokio::test]
    async fn settings_map_contains_defaults() {
        let db = test_db();
        let settings = get_settings(&db).await.unwrap();
        assert_eq!(settings.get("invoice_prefix").map(String::as_str), Some("INV-"));
        assert_eq!(settings.get("company_name").map(String::as_str), Some("Tech Repairs"));
    }
}
