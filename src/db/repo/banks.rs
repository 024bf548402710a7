//! Bank registry operations: the fan-out target set for new applications.

use crate::domain::{BankId, TimeMs};
use sqlx::Row;

use super::{BankRow, Repository};

impl Repository {
    /// Register a bank idempotently. Returns false when the id was already
    /// registered.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn register_bank(
        &self,
        id: &BankId,
        name: &str,
        registered_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO banks (id, name, registered_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(name)
        .bind(registered_at.as_ms())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All registered banks, oldest registration first.
    pub async fn list_banks(&self) -> Result<Vec<BankRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, registered_at FROM banks ORDER BY registered_at ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| BankRow {
                id: BankId::new(row.get("id")),
                name: row.get("name"),
                registered_at: TimeMs::new(row.get("registered_at")),
            })
            .collect())
    }

    /// Whether a bank id is registered.
    pub async fn bank_exists(&self, id: &BankId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 AS one FROM banks WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_repo;
    use crate::domain::{BankId, TimeMs};

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (repo, _temp) = setup_repo().await;
        let id = BankId::new("bank-1".to_string());

        let first = repo
            .register_bank(&id, "First Bank", TimeMs::new(100))
            .await
            .unwrap();
        let second = repo
            .register_bank(&id, "First Bank", TimeMs::new(200))
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        let banks = repo.list_banks().await.unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].registered_at, TimeMs::new(100));
        assert!(repo.bank_exists(&id).await.unwrap());
        assert!(!repo
            .bank_exists(&BankId::new("bank-2".to_string()))
            .await
            .unwrap());
    }
}
