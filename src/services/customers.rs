use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Customer, CustomerPayload};
use crate::utils::now_rfc3339;

pub async fn list_customers(db: &Arc<Mutex<Database>>) -> Result<Vec<Customer>> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.list_customers()
}

pub async fn get_customer(db: &Arc<Mutex<Database>>, id: i64) -> Result<Customer> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    db.get_customer(id)?.ok_or(Error::NotFound("customer"))
}

pub async fn create_customer(
    db: &Arc<Mutex<Database>>,
    payload: CustomerPayload,
) -> Result<Customer> {
    if payload.name.trim().is_empty() {
        return Err(Error::InvalidOperation("customer name is required".to_string()));
    }
    let db = db.lock().map_err(|_| Error::Lock)?;
    let id = db.insert_customer(&payload, &now_rfc3339())?;
    db.get_customer(id)?.ok_or(Error::NotFound("customer"))
}

pub async fn update_customer(
    db: &Arc<Mutex<Database>>,
    id: i64,
    payload: CustomerPayload,
) -> Result<Customer> {
    if payload.name.trim().is_empty() {
        return Err(Error::InvalidOperation("customer name is required".to_string()));
    }
    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.update_customer(id, &payload, &now_rfc3339())? == 0 {
        return Err(Error::NotFound("customer"));
    }
    db.get_customer(id)?.ok_or(Error::NotFound("customer"))
}

/// Fails with `ConstraintViolation` while tickets still reference the
/// customer; confirmation is the caller's concern.
pub async fn delete_customer(db: &Arc<Mutex<Database>>, id: i64) -> Result<()> {
    let db = db.lock().map_err(|_| Error::Lock)?;
    if db.delete_customer(id)? == 0 {
        return Err(Error::NotFound("customer"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    fn named(name: &str) -> CustomerPayload {
        CustomerPayload {
            name: name.to_string(),
            ..CustomerPayload::default()
        }
    }

    #[tokio::test]
    async fn create_and_fetch() {
        let db = test_db();
        let created = create_customer(&db, named("Dana")).await.unwrap();
        assert_eq!(created.ticket_count, 0);
        assert_eq!(created.total_spent, 0.0);

        let fetched = get_customer(&db, created.id).await.unwrap();
        assert_eq!(fetched.name, "Dana");
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let db = test_db();
        let err = create_customer(&db, named("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn update_unknown_customer_is_not_found() {
        let db = test_db();
        let err = update_customer(&db, 99, named("Eve")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound("customer")));
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let db = test_db();
        create_customer(&db, named("Zoe")).await.unwrap();
        create_customer(&db, named("Amir")).await.unwrap();
        let names: Vec<String> = list_customers(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Amir", "Zoe"]);
    }

    #[tokio::test]
    async fn delete_unknown_customer_is_not_found() {
        let db = test_db();
        let err = delete_customer(&db, 7).await.unwrap_err();
        assert!(matches!(err, Error::NotFound("customer")));
    }
}
