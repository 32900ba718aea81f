//! User accounts with Argon2id-hashed credentials, plus ephemeral guests.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::any::AnyRow;
use tracing::debug;

use super::{opt_text, uuid};
use crate::db::{Database, LogFailure};
use crate::error::{Error, Result};
use crate::models::{GuestUser, User};
use crate::query::{Filter, Select};

/// Domain of the placeholder addresses handed to guests.
pub const GUEST_EMAIL_DOMAIN: &str = "guest.user";

/// Hash a password with Argon2id and a random salt.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2id hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Users registered under `email`. Empty when there are none.
    pub async fn get_by_email(&self, email: &str) -> Result<Vec<User>> {
        let stmt = Select::from("users")
            .filter(Filter::new().eq("email", email))
            .build();
        let rows = self
            .db
            .fetch_all(&stmt)
            .await
            .log_failure("get user by email")?;
        rows.iter().map(user_from_row).collect()
    }

    /// Register a user. Only the Argon2id hash of `password` is stored.
    pub async fn create(&self, email: &str, password: &str) -> Result<User> {
        let user = User {
            id: crate::id::generate(),
            email: Some(email.to_string()),
            password_hash: Some(hash_password(password)?),
        };

        async {
            sqlx::query("INSERT INTO users (id, email, password) VALUES ($1, $2, $3)")
                .bind(user.id.to_string())
                .bind(user.email.as_deref())
                .bind(user.password_hash.as_deref())
                .execute(self.db.pool()?)
                .await?;
            debug!(user_id = %user.id, "Created user");
            Ok::<_, Error>(())
        }
        .await
        .log_failure("create user")?;

        Ok(user)
    }

    /// Mint an identity for an unauthenticated session. Nothing is written.
    pub fn create_guest(&self) -> GuestUser {
        let id = crate::id::generate();
        GuestUser {
            id,
            email: format!("guest-{id}@{GUEST_EMAIL_DOMAIN}"),
        }
    }

    /// Check `password` against the user's stored hash. Users without a
    /// credential never verify.
    pub fn verify_password(&self, user: &User, password: &str) -> Result<bool> {
        match user.password_hash.as_deref() {
            Some(hash) => verify_password(password, hash),
            None => Ok(false),
        }
    }
}

fn user_from_row(row: &AnyRow) -> Result<User> {
    Ok(User {
        id: uuid(row, "id")?,
        email: opt_text(row, "email")?,
        password_hash: opt_text(row, "password")?,
    })
}
