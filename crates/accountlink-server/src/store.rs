//! Account persistence.
//!
//! [`AccountStore`] is the write side the confirmation handlers act on; it
//! extends [`PrincipalStore`] so the same backend answers post-verification
//! lookups. [`MemoryAccountStore`] keeps everything in process.

use std::collections::HashMap;

use accountlink_auth::{Principal, PrincipalStore, TokenResult};
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::passwords::check_username;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Account not found: {id}")]
    NotFound { id: u64 },

    #[error("An account with this {field} already exists")]
    Duplicate { field: &'static str },

    #[error("Invalid account data: {message}")]
    Invalid { message: String },
}

/// Stored account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    /// Set once the `account_create` token was confirmed.
    pub active: bool,
    pub created_at: OffsetDateTime,
}

impl AccountRecord {
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone(), self.email.clone())
    }
}

#[async_trait]
pub trait AccountStore: PrincipalStore {
    /// Inserts an inactive account and assigns its id.
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: Option<String>,
    ) -> Result<AccountRecord, StoreError>;

    async fn get(&self, id: u64) -> Result<Option<AccountRecord>, StoreError>;

    /// Looks an account up by username (case-insensitive) or email.
    async fn find_by_login(&self, login: &str) -> Result<Option<AccountRecord>, StoreError>;

    async fn update_email(&self, id: u64, email: &str) -> Result<AccountRecord, StoreError>;

    async fn set_password_hash(&self, id: u64, hash: String) -> Result<(), StoreError>;

    async fn activate(&self, id: u64) -> Result<(), StoreError>;

    /// Returns `false` if no such account existed.
    async fn delete(&self, id: u64) -> Result<bool, StoreError>;
}

/// Lowercases and trims an email, rejecting values without `@`.
pub fn normalize_email(email: &str) -> Result<String, StoreError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(StoreError::Invalid {
            message: format!("'{email}' is not a valid email address"),
        }),
    }
}

#[derive(Debug, Default)]
struct AccountTable {
    next_id: u64,
    rows: HashMap<u64, AccountRecord>,
}

impl AccountTable {
    fn ensure_unique(
        &self,
        username: Option<&str>,
        email: &str,
        except: Option<u64>,
    ) -> Result<(), StoreError> {
        for row in self.rows.values().filter(|row| Some(row.id) != except) {
            if username.is_some_and(|u| row.username.eq_ignore_ascii_case(u)) {
                return Err(StoreError::Duplicate { field: "username" });
            }
            if row.email == email {
                return Err(StoreError::Duplicate { field: "email" });
            }
        }
        Ok(())
    }

    fn row_mut(&mut self, id: u64) -> Result<&mut AccountRecord, StoreError> {
        self.rows.get_mut(&id).ok_or(StoreError::NotFound { id })
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    table: RwLock<AccountTable>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }
}

#[async_trait]
impl PrincipalStore for MemoryAccountStore {
    async fn find_by_id(&self, id: u64) -> TokenResult<Option<Principal>> {
        Ok(self
            .table
            .read()
            .await
            .rows
            .get(&id)
            .map(AccountRecord::principal))
    }

    async fn find_by_email(&self, email: &str) -> TokenResult<Option<Principal>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .find(|row| row.email == email)
            .map(AccountRecord::principal))
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: Option<String>,
    ) -> Result<AccountRecord, StoreError> {
        check_username(username).map_err(|message| StoreError::Invalid { message })?;
        let username = username.trim();
        let email = normalize_email(email)?;

        let mut table = self.table.write().await;
        table.ensure_unique(Some(username), &email, None)?;

        table.next_id += 1;
        let record = AccountRecord {
            id: table.next_id,
            username: username.to_string(),
            email,
            password_hash,
            active: false,
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.insert(record.id, record.clone());
        tracing::debug!(principal_id = record.id, "Account created");
        Ok(record)
    }

    async fn get(&self, id: u64) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<AccountRecord>, StoreError> {
        let login = login.trim();
        let email = login.to_lowercase();
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .find(|row| row.username.eq_ignore_ascii_case(login) || row.email == email)
            .cloned())
    }

    async fn update_email(&self, id: u64, email: &str) -> Result<AccountRecord, StoreError> {
        let email = normalize_email(email)?;
        let mut table = self.table.write().await;
        table.ensure_unique(None, &email, Some(id))?;
        let row = table.row_mut(id)?;
        row.email = email;
        Ok(row.clone())
    }

    async fn set_password_hash(&self, id: u64, hash: String) -> Result<(), StoreError> {
        self.table.write().await.row_mut(id)?.password_hash = Some(hash);
        Ok(())
    }

    async fn activate(&self, id: u64) -> Result<(), StoreError> {
        self.table.write().await.row_mut(id)?.active = true;
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
