//! Registration and login

use bson::oid::ObjectId;
use serde::Deserialize;
use tracing::{debug, info};

use super::Desk;
use crate::auth::{hash_password, verify_password};
use crate::db::schemas::UserDoc;
use crate::types::{DeskError, Result};

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_NAME_CHARS: usize = 80;

/// Request body for registration
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub skills: Vec<String>,
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(DeskError::validation("A valid email is required"));
    }
    Ok(email)
}

impl Desk {
    pub async fn register(&self, input: NewUser) -> Result<UserDoc> {
        let name = input.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(DeskError::validation(format!(
                "Name must be between 1 and {} characters",
                MAX_NAME_CHARS
            )));
        }
        let email = normalize_email(&input.email)?;
        if input.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(DeskError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(DeskError::Conflict("Email already registered".into()));
        }

        let mut user = UserDoc::new(name.to_string(), email, hash_password(&input.password)?);
        user.department = input.department.trim().to_string();
        user.year = input.year;
        user.skills = input
            .skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let id = self.store.insert_user(user.clone()).await?;
        user._id = Some(id);

        info!(user = %id, "user registered");
        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserDoc> {
        let invalid = || DeskError::Unauthorized("Invalid email or password".into());

        let email = normalize_email(email).map_err(|_| invalid())?;
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            debug!(email = %email, "password mismatch");
            return Err(invalid());
        }
        Ok(user)
    }

    pub async fn current_user(&self, actor: &ObjectId) -> Result<UserDoc> {
        self.require_user(actor).await
    }
}
