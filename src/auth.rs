use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::models::{LoginRequest, SignupRequest, User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
}

impl AuthService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<User, AuthError> {
        let username = request.username.trim().to_string();
        let email = request.email.trim().to_lowercase();

        if username.len() < 3 {
            return Err(AuthError::Validation(
                "Username must be at least 3 characters".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        if request.password.len() < 6 {
            return Err(AuthError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        if self.db.get_user_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: hash_password(&request.password)?,
            full_name: request
                .full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            created_at: Utc::now(),
        };

        self.db.create_user(&user).await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Authenticate by username or email address.
    pub async fn login(&self, request: LoginRequest) -> Result<User, AuthError> {
        let identifier = request.identifier.trim();

        let user = match self.db.get_user_by_username(identifier).await? {
            Some(user) => Some(user),
            None => {
                self.db
                    .get_user_by_email(&identifier.to_lowercase())
                    .await?
            }
        };

        let user = match user {
            Some(user) => user,
            None => {
                warn!(identifier = %identifier, "Login attempt for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(&request.password, &user.password_hash) {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, username = %user.username, "User logged in");
        Ok(user)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}
