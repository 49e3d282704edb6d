//! Local credential checks and form validation.
//!
//! The hosted identity provider stays authoritative online; this covers the
//! offline path against the local dataset plus the messages shown for
//! provider error codes.

use crate::model::{Role, SessionUser, User};
use crate::repo::Repository;
use crate::session::Session;
use crate::store::StoreError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Form problem caught before touching storage.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Rejected(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    Login,
    Signup,
}

impl AuthOperation {
    pub fn parse(s: &str) -> Option<AuthOperation> {
        match s {
            "login" => Some(AuthOperation::Login),
            "signup" => Some(AuthOperation::Signup),
            _ => None,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            AuthOperation::Login => "Login failed. ",
            AuthOperation::Signup => "Signup failed. ",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    pub school: String,
    pub terms_agreed: bool,
}

pub fn validate_login(form: &LoginForm) -> Result<Role, AuthError> {
    if form.email.trim().is_empty() || form.password.is_empty() || form.role.is_empty() {
        return Err(AuthError::Validation("Please fill all fields".to_string()));
    }
    Role::parse(&form.role)
        .ok_or_else(|| AuthError::Validation(format!("Unknown role: {}", form.role)))
}

pub fn validate_signup(form: &SignupForm) -> Result<Role, AuthError> {
    let required = [
        form.name.trim(),
        form.email.trim(),
        form.password.as_str(),
        form.confirm_password.as_str(),
        form.role.as_str(),
        form.school.trim(),
    ];
    if required.iter().any(|v| v.is_empty()) {
        return Err(AuthError::Validation(
            "Please fill all required fields".to_string(),
        ));
    }
    if form.password != form.confirm_password {
        return Err(AuthError::Validation("Passwords do not match".to_string()));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !form.terms_agreed {
        return Err(AuthError::Validation(
            "You must agree to the terms and conditions".to_string(),
        ));
    }
    Role::parse(&form.role)
        .ok_or_else(|| AuthError::Validation(format!("Unknown role: {}", form.role)))
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Checks the stored hash when there is one; seeded demo users carry a
/// plaintext password instead.
pub fn verify_password(user: &User, password: &str) -> bool {
    if let Some(stored) = &user.password_hash {
        let Ok(parsed) = PasswordHash::new(stored) else {
            warn!(email = %user.email, "stored password hash is unreadable");
            return false;
        };
        return Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
    }
    user.password.as_deref() == Some(password)
}

/// Human-readable message for a provider error code.
pub fn describe_provider_error(op: AuthOperation, code: &str, fallback: &str) -> String {
    let detail = match (op, code) {
        (AuthOperation::Login, "auth/user-not-found" | "auth/wrong-password") => {
            "Invalid email or password"
        }
        (AuthOperation::Login, "auth/user-disabled") => "Account has been disabled",
        (AuthOperation::Login, "auth/too-many-requests") => "Too many attempts. Try again later",
        (AuthOperation::Signup, "auth/email-already-in-use") => "Email already registered",
        (AuthOperation::Signup, "auth/invalid-email") => "Invalid email address",
        (AuthOperation::Signup, "auth/operation-not-allowed") => {
            "Email/password accounts are not enabled"
        }
        (AuthOperation::Signup, "auth/weak-password") => "Password is too weak",
        _ => fallback,
    };
    format!("{}{}", op.prefix(), detail)
}

pub fn login(repo: &Repository, form: &LoginForm) -> Result<Session, AuthError> {
    let role = validate_login(form)?;
    let email = form.email.trim();

    let Some(user) = repo.get_user(email)? else {
        warn!(email, "login rejected: unknown user");
        return Err(AuthError::Rejected(describe_provider_error(
            AuthOperation::Login,
            "auth/user-not-found",
            "",
        )));
    };
    if !verify_password(&user, &form.password) {
        warn!(email, "login rejected: bad password");
        return Err(AuthError::Rejected(describe_provider_error(
            AuthOperation::Login,
            "auth/wrong-password",
            "",
        )));
    }
    if user.role != role {
        return Err(AuthError::Rejected(
            "Selected role does not match your account role".to_string(),
        ));
    }

    let user = repo.record_login(email)?.unwrap_or(user);
    let session = repo.sessions().create(SessionUser::from(&user))?;
    info!(email, role = role.as_str(), "login accepted");
    Ok(session)
}

pub fn signup(repo: &Repository, form: &SignupForm) -> Result<Session, AuthError> {
    let role = validate_signup(form)?;
    let now = repo.now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: form.email.trim().to_string(),
        password: None,
        password_hash: Some(hash_password(&form.password)?),
        role,
        name: form.name.trim().to_string(),
        school: Some(form.school.trim().to_string()),
        school_id: None,
        province: None,
        district: None,
        subjects: Vec::new(),
        grade: None,
        phone: None,
        children: Vec::new(),
        parent_email: None,
        last_login: Some(now),
        avatar: None,
    };
    let snapshot = SessionUser::from(&user);

    match repo.register_user(user)? {
        Some(true) => {}
        Some(false) => {
            return Err(AuthError::Rejected(describe_provider_error(
                AuthOperation::Signup,
                "auth/email-already-in-use",
                "",
            )))
        }
        None => {
            return Err(AuthError::Rejected(
                "Signup failed. Local data is not initialized".to_string(),
            ))
        }
    }

    let session = repo.sessions().create(snapshot)?;
    info!(email = %session.user.email, role = role.as_str(), "account created");
    Ok(session)
}
