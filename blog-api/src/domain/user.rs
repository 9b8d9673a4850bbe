use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::DomainError;
use super::patch::Patch;

pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Patch<String>,
    #[serde(default)]
    pub name: Patch<Option<String>>,
}

/// What happens to a user's posts when the user is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserDeletePolicy {
    /// Refuse with a conflict while the user still owns posts.
    #[default]
    Reject,
    /// Delete the posts in the same unit-of-work, then the user.
    Cascade,
}

impl FromStr for UserDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!("expected `reject` or `cascade`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    if email.chars().count() > EMAIL_MAX_LEN {
        return Err(DomainError::ValidationError(format!(
            "Email cannot be longer than {} characters",
            EMAIL_MAX_LEN
        )));
    }
    Ok(())
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_email(&self.email)
    }

    /// Trims the email so uniqueness is checked on what users actually typed.
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_string();
        self
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        match self.email.as_present() {
            Some(email) => validate_email(email),
            None => Ok(()),
        }
    }

    pub fn normalized(mut self) -> Self {
        if let Patch::Present(email) = self.email {
            self.email = Patch::Present(email.trim().to_string());
        }
        self
    }
}

impl User {
    pub fn apply(&mut self, patch: UpdateUserRequest) {
        patch.email.apply_to(&mut self.email);
        patch.name.apply_to(&mut self.name);
    }
}
