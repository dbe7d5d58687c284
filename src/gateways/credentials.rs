//! # Credential Provider
//!
//! Supplies backend credentials as an explicitly passed handle. Providers are
//! synchronous and hold no process-wide state.

use crate::constants::{defaults, env as env_vars};
use crate::error::{RequestError, Result};
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FileStoreCredentials {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for FileStoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStoreCredentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub trait CredentialProvider: Send + Sync + fmt::Debug {
    fn database_credentials(&self) -> Result<DatabaseCredentials>;

    fn file_store_credentials(&self) -> Result<FileStoreCredentials>;
}

/// Reads `DB_UID`/`DB_PWD` and `SFTP_HOST`/`SFTP_USER`/`SFTP_PWD`
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    default_host: String,
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(defaults::FILE_STORE_HOST)
    }
}

impl EnvCredentialProvider {
    pub fn new(default_host: impl Into<String>) -> Self {
        Self {
            default_host: default_host.into(),
        }
    }

    fn required(name: &str) -> Result<String> {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(RequestError::Configuration(format!(
                "environment variable {name} is not set"
            ))),
        }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn database_credentials(&self) -> Result<DatabaseCredentials> {
        Ok(DatabaseCredentials {
            username: Self::required(env_vars::DB_USERNAME)?,
            password: Self::required(env_vars::DB_PASSWORD)?,
        })
    }

    fn file_store_credentials(&self) -> Result<FileStoreCredentials> {
        let host = std::env::var(env_vars::FILE_STORE_HOST)
            .ok()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| self.default_host.clone());
        Ok(FileStoreCredentials {
            host,
            username: Self::required(env_vars::FILE_STORE_USERNAME)?,
            password: Self::required(env_vars::FILE_STORE_PASSWORD)?,
        })
    }
}

/// Fixed credentials, for embedding applications and tests
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    database: DatabaseCredentials,
    file_store: FileStoreCredentials,
}

impl StaticCredentialProvider {
    pub fn new(database: DatabaseCredentials, file_store: FileStoreCredentials) -> Self {
        Self {
            database,
            file_store,
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn database_credentials(&self) -> Result<DatabaseCredentials> {
        Ok(self.database.clone())
    }

    fn file_store_credentials(&self) -> Result<FileStoreCredentials> {
        Ok(self.file_store.clone())
    }
}
