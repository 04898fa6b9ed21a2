use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::WalletStorage;
use crate::core::domain::User;
use crate::core::errors::WalletError;

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub timezone: String,
    pub password_hash: String,
}

/// A user together with the stored password hash, for login checks only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User, WalletError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        timezone: row.try_get("timezone")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl WalletStorage {
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, WalletError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, phone, timezone, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(new_user.email.to_lowercase())
        .bind(&new_user.name)
        .bind(&new_user.timezone)
        .bind(&new_user.password_hash)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(WalletError::Conflict("Email already registered".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(user_id = %id, "user created");
        self.get_user(&id).await?.ok_or_else(|| WalletError::InternalError("User vanished after insert".to_string()))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, WalletError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, WalletError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: user_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: &str,
        phone: Option<&str>,
        timezone: &str,
    ) -> Result<User, WalletError> {
        let result = sqlx::query(
            "UPDATE users SET name = ?1, phone = ?2, timezone = ?3, updated_at = ?4 WHERE id = ?5",
        )
        .bind(name)
        .bind(phone)
        .bind(timezone)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::NotFoundError("User not found".to_string()));
        }
        self.get_user(user_id)
            .await?
            .ok_or_else(|| WalletError::NotFoundError("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Alice".to_string(),
            timezone: "UTC".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let storage = WalletStorage::in_memory().await.unwrap();
        let user = storage.create_user(new_user("Alice@Example.com")).await.unwrap();
        assert_eq!(user.email, "alice@example.com");

        let creds = storage.get_user_by_email("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(creds.user.id, user.id);
        assert_eq!(creds.password_hash, "$argon2id$placeholder");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let storage = WalletStorage::in_memory().await.unwrap();
        storage.create_user(new_user("bob@example.com")).await.unwrap();
        let err = storage.create_user(new_user("bob@example.com")).await.unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let storage = WalletStorage::in_memory().await.unwrap();
        let user = storage.create_user(new_user("carol@example.com")).await.unwrap();
        let updated = storage
            .update_profile(&user.id, "Carol", Some("+1-555-0100"), "Europe/Berlin")
            .await
            .unwrap();
        assert_eq!(updated.name, "Carol");
        assert_eq!(updated.phone.as_deref(), Some("+1-555-0100"));
        assert_eq!(updated.timezone, "Europe/Berlin");

        let missing = storage.update_profile("nope", "X", None, "UTC").await;
        assert!(matches!(missing, Err(WalletError::NotFoundError(_))));
    }
}
