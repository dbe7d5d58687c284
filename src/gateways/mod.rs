//! # Gateways
//!
//! Boundary adapters between the engine and its backends. The engine only
//! sees the [`DataStoreGateway`] and [`FileStoreGateway`] traits plus a
//! [`CredentialProvider`] handle; concrete adapters live alongside:
//!
//! - `PgDataStore`: sqlx/PostgreSQL request catalog (`postgres` feature)
//! - [`LocalFileStore`]: tokio::fs over a mounted file tree
//! - [`InMemoryDataStore`] / [`InMemoryFileStore`]: dry runs and tests

pub mod credentials;
pub mod in_memory;
pub mod local_file_store;
pub mod paths;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use credentials::{
    CredentialProvider, DatabaseCredentials, EnvCredentialProvider, FileStoreCredentials,
    StaticCredentialProvider,
};
pub use in_memory::{InMemoryDataStore, InMemoryFileStore};
pub use local_file_store::LocalFileStore;
pub use paths::{
    db_path_to_remote_path, default_backup_resolver, directory_covers, parent_directory,
    processed_path, BackupPathResolver,
};
#[cfg(feature = "postgres")]
pub use postgres::PgDataStore;
pub use traits::{DataStoreGateway, FileStoreGateway};
