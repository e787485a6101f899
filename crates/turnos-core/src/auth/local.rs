//! Account-backed auth provider on the local database.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;

use super::{AuthError, AuthProvider, AuthResult, SessionHub, SessionSubscription};
use crate::db::{with_blocking, Account, DbError, SharedDatabase};
use crate::models::Session;

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Argon2id hash of `password` with a fresh salt, as a PHC string.
fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC string. An unparsable hash never
/// verifies.
fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// [`AuthProvider`] over the `accounts` table.
pub struct LocalAuthProvider {
    db: SharedDatabase,
    hub: SessionHub,
}

impl LocalAuthProvider {
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            db,
            hub: SessionHub::new(),
        }
    }

    /// Create an account. Returns the new account's uid.
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<String> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidAccount(format!("invalid email: {:?}", email)));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidAccount(format!(
                "password must have at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let account = Account {
            uid: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let uid = account.uid.clone();

        match with_blocking(&self.db, move |db| db.insert_account(&account)).await {
            Ok(()) => {
                tracing::info!(%email, "account registered");
                Ok(uid)
            }
            Err(DbError::Constraint(_)) => Err(AuthError::AccountExists(email)),
            Err(e) => Err(e.into()),
        }
    }

    /// Currently open session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email);
        let lookup = email.clone();
        let account = with_blocking(&self.db, move |db| db.get_account_by_email(&lookup)).await?;

        let account = match account {
            Some(account) if verify_password(password, &account.password_hash) => account,
            _ => {
                tracing::warn!(%email, "sign-in rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let session = Session::new(account.uid, account.email);
        self.hub.publish(Some(session.clone()));
        tracing::info!(email = %session.email, "signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.hub.current() {
            tracing::info!(email = %session.email, "signed out");
        }
        self.hub.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }
}
