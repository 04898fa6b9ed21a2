//! Account registration, credential checks and profile edits.

use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::domain::User;
use crate::core::errors::WalletError;
use crate::core::validation::{validate_email, validate_password};
use crate::crypto::{hash_password, verify_password};
use crate::monitoring::BusinessMetrics;
use crate::storage::{NewUser, WalletStorage};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Checked against when the email is unknown, so every login runs one Argon2 verification.
static UNKNOWN_USER_HASH: Lazy<String> =
    Lazy::new(|| hash_password("unknown-account-placeholder").unwrap_or_default());

pub struct ProfileService {
    storage: Arc<WalletStorage>,
    metrics: Arc<BusinessMetrics>,
}

impl ProfileService {
    pub fn new(storage: Arc<WalletStorage>, metrics: Arc<BusinessMetrics>) -> Self {
        Self { storage, metrics }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        timezone: Option<&str>,
    ) -> Result<User, WalletError> {
        let email = email.trim();
        validate_email(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletError::ValidationError("Name is required".to_string()));
        }
        let timezone = timezone.map(str::trim).filter(|tz| !tz.is_empty()).unwrap_or("UTC");

        let password_hash = hash_password(password)?;
        let user = self
            .storage
            .create_user(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                timezone: timezone.to_string(),
                password_hash,
            })
            .await?;
        self.metrics.record_registration();
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Unknown emails and wrong passwords fail with the same message.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, WalletError> {
        let credentials = self.storage.get_user_by_email(email.trim()).await?;
        let verified = match &credentials {
            Some(creds) => verify_password(password, &creds.password_hash)?,
            None => {
                let _ = verify_password(password, &UNKNOWN_USER_HASH);
                false
            }
        };
        self.metrics.record_login_attempt(verified);

        match credentials {
            Some(creds) if verified => Ok(creds.user),
            _ => {
                warn!("login rejected");
                Err(WalletError::Unauthorized(INVALID_CREDENTIALS.to_string()))
            }
        }
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<User, WalletError> {
        self.storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| WalletError::NotFoundError("User not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: &str,
        phone: Option<&str>,
        timezone: &str,
    ) -> Result<User, WalletError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletError::ValidationError("Name is required".to_string()));
        }
        let timezone = timezone.trim();
        if timezone.is_empty() {
            return Err(WalletError::ValidationError("Timezone is required".to_string()));
        }
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());

        let user = self.storage.update_profile(user_id, name, phone, timezone).await?;
        info!(user_id, "profile updated");
        Ok(user)
    }
}
