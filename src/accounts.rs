//! Local account registry backing the login step.
//!
//! Accounts live in the profile store as one JSON map keyed by user name.
//! Passwords are stored as salted SHA-256 digests; the plaintext never
//! reaches the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::macros::format_description;

use crate::store::{ProfileStore, StoreError, keys};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User name {0:?} is already taken")]
    NameTaken(String),
    #[error("User name and password must not be empty")]
    MissingFields,
    #[error("Unknown user {0:?}")]
    UnknownUser(String),
    #[error("Password does not match")]
    WrongPassword,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid account data in store: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Failed to generate password salt: {0}")]
    Salt(String),
}

/// One registered account as persisted under `auth.users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub name: String,
    pub email: String,
    salt: String,
    password_digest: String,
    pub created_at: String,
}

/// Register a new account, rejecting duplicate names before any write.
pub fn register(
    store: &mut impl ProfileStore,
    name: &str,
    password: &str,
    email: &str,
) -> Result<(), AccountError> {
    let name = name.trim();
    if name.is_empty() || password.is_empty() {
        return Err(AccountError::MissingFields);
    }
    let mut users = load_users(store)?;
    if users.contains_key(name) {
        return Err(AccountError::NameTaken(name.to_string()));
    }
    let salt = new_salt()?;
    let record = AccountRecord {
        name: name.to_string(),
        email: email.trim().to_string(),
        password_digest: digest(&salt, password),
        salt,
        created_at: today(),
    };
    users.insert(name.to_string(), record);
    save_users(store, &users)
}

/// Verify a name/password pair against the registry.
pub fn verify_login(
    store: &impl ProfileStore,
    name: &str,
    password: &str,
) -> Result<(), AccountError> {
    let users = load_users(store)?;
    let record = users
        .get(name.trim())
        .ok_or_else(|| AccountError::UnknownUser(name.trim().to_string()))?;
    if digest(&record.salt, password) != record.password_digest {
        return Err(AccountError::WrongPassword);
    }
    Ok(())
}

fn load_users(store: &impl ProfileStore) -> Result<BTreeMap<String, AccountRecord>, AccountError> {
    match store.get(keys::USERS)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(BTreeMap::new()),
    }
}

fn save_users(
    store: &mut impl ProfileStore,
    users: &BTreeMap<String, AccountRecord>,
) -> Result<(), AccountError> {
    let payload = serde_json::to_string(users)?;
    store.set(keys::USERS, &payload)?;
    Ok(())
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn new_salt() -> Result<String, AccountError> {
    use rand::TryRngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| AccountError::Salt(err.to_string()))?;
    Ok(hex_encode(&bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn today() -> String {
    let format = format_description!("[year]-[month]-[day]");
    time::OffsetDateTime::now_utc()
        .date()
        .format(&format)
        .unwrap_or_default()
}
