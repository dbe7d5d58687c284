//! # PostgreSQL Data Store
//!
//! sqlx adapter for the request catalog. Every `sqlx::Error` is normalized
//! through `From<sqlx::Error> for RequestError`, so pool timeouts and lock
//! contention surface as retryable connectivity errors.
//!
//! Checksum deletion and rerun triggering are scoped to the request's
//! district and, when a path is recorded, to the uploads whose directory
//! covers it; only active SFTP integration uploads (`upload_type_id = 5`,
//! `class_name_type = 2`, `run = 1`) are touched.

use super::credentials::CredentialProvider;
use super::traits::DataStoreGateway;
use crate::config::DatabaseConfig;
use crate::error::{RequestError, Result};
use crate::models::{Request, RequestId, RequestQuery, RequestType};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};

const REQUEST_COLUMNS: &str = r#"
    r.request_id,
    r.district_id,
    r.data_request_type_id AS request_type_id,
    COALESCE(t.name, '') AS request_type_name,
    r.imported_file_name,
    r.status,
    r.request_time
"#;

const ACTIVE_UPLOAD_FILTER: &str =
    "du.upload_type_id = 5 AND du.class_name_type = 2 AND du.run = 1";

/// Upload rows whose directory is the recorded path or one of its parents.
/// Mirrors [`directory_covers`](super::paths::directory_covers).
fn upload_scope_filter(param: &str) -> String {
    format!(
        r#"(
                {param}::text IS NULL
                OR (
                    rtrim(du.directory_path, '\/') <> ''
                    AND (
                        rtrim(replace(lower(du.directory_path), '\', '/'), '/')
                            = rtrim(replace(lower({param}), '\', '/'), '/')
                        OR starts_with(
                            replace(lower({param}), '\', '/'),
                            rtrim(replace(lower(du.directory_path), '\', '/'), '/') || '/'
                        )
                    )
                )
            )"#
    )
}

#[derive(Debug, Clone)]
pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and the credential provider
    ///
    /// An explicit `database.url` wins over host/port/database; credentials
    /// are only consulted when no URL is configured.
    pub async fn connect(
        config: &DatabaseConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self> {
        let options = match &config.url {
            Some(url) => url.parse::<PgConnectOptions>().map_err(|e| {
                RequestError::Configuration(format!("invalid database url: {e}"))
            })?,
            None => {
                let creds = credentials.database_credentials()?;
                PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .database(&config.database)
                    .username(&creds.username)
                    .password(&creds.password)
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "✅ Data store pool connected"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Escape LIKE metacharacters in a user-supplied fragment
    fn like_escape(fragment: &str) -> String {
        fragment
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    }
}

#[async_trait]
impl DataStoreGateway for PgDataStore {
    async fn list_request_types(&self, name_filter: Option<&str>) -> Result<Vec<RequestType>> {
        let pattern = name_filter
            .filter(|f| !f.is_empty())
            .map(|f| format!("%{}%", Self::like_escape(f)));

        let types = sqlx::query_as::<_, RequestType>(
            r#"
            SELECT data_request_type_id AS request_type_id, name
            FROM data_request_type
            WHERE $1::text IS NULL OR name ILIKE $1
            ORDER BY name
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    async fn find_requests(&self, query: &RequestQuery) -> Result<Vec<Request>> {
        let prefixes: Vec<String> = query
            .type_names
            .iter()
            .map(|p| format!("{}%", Self::like_escape(p)))
            .collect();

        let sql = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM request r
            JOIN data_request_type t ON t.data_request_type_id = r.data_request_type_id
            JOIN (
                SELECT district_id, data_request_type_id, MAX(request_id) AS max_request_id
                FROM request
                WHERE status = ANY($1)
                  AND (cardinality($2::bigint[]) = 0 OR district_id = ANY($2))
                GROUP BY district_id, data_request_type_id
            ) latest ON latest.max_request_id = r.request_id
            WHERE (
                (cardinality($3::bigint[]) = 0 AND cardinality($4::text[]) = 0)
                OR r.data_request_type_id = ANY($3)
                OR t.name ILIKE ANY($4)
            )
              AND ($5::timestamp IS NULL OR r.request_time >= $5)
            ORDER BY r.request_time DESC NULLS LAST, r.request_id DESC
            "#
        );

        let requests = sqlx::query_as::<_, Request>(&sql)
            .bind(&query.statuses)
            .bind(&query.district_ids)
            .bind(&query.type_ids)
            .bind(&prefixes)
            .bind(query.since)
            .fetch_all(&self.pool)
            .await?;

        debug!(found = requests.len(), "Request lookup complete");
        Ok(requests)
    }

    async fn get_request(&self, request_id: RequestId) -> Result<Request> {
        let sql = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM request r
            JOIN data_request_type t ON t.data_request_type_id = r.data_request_type_id
            WHERE r.request_id = $1
            "#
        );

        sqlx::query_as::<_, Request>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RequestError::not_found(format!("request {request_id}")))
    }

    async fn directory_path(&self, request_id: RequestId) -> Result<Option<String>> {
        let path = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT COALESCE(
                NULLIF(r.imported_file_name, ''),
                (SELECT du.directory_path
                 FROM xps_district_upload du
                 WHERE du.district_id = r.district_id
                 ORDER BY du.xps_district_upload_id
                 LIMIT 1)
            )
            FROM request r
            WHERE r.request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RequestError::not_found(format!("request {request_id}")))?;

        Ok(path)
    }

    async fn delete_checksums(
        &self,
        request_id: RequestId,
        keys: Option<&[String]>,
    ) -> Result<u64> {
        let keys: Vec<String> = keys.map(<[String]>::to_vec).unwrap_or_default();
        let scope = self.directory_path(request_id).await?;

        let sql = format!(
            r#"
            DELETE FROM upload_file_integration_checksum ufc
            USING xps_district_upload du, request r
            WHERE ufc.xps_district_upload_id = du.xps_district_upload_id
              AND r.request_id = $1
              AND du.district_id = r.district_id
              AND {ACTIVE_UPLOAD_FILTER}
              AND (cardinality($2::text[]) = 0 OR ufc.key = ANY($2))
              AND {scope_filter}
            "#,
            scope_filter = upload_scope_filter("$3"),
        );

        let result = sqlx::query(&sql)
            .bind(request_id)
            .bind(&keys)
            .bind(scope.as_deref())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn trigger_rerun(&self, request_id: RequestId) -> Result<u64> {
        let scope = self.directory_path(request_id).await?;
        let sql = format!(
            r#"
            UPDATE xps_queue q
            SET xps_queue_status_id = 2, xps_queue_result_id = 5
            FROM (
                SELECT MAX(q2.xps_queue_id) AS max_queue_id
                FROM xps_queue q2
                JOIN xps_district_upload du ON q2.xps_district_upload_id = du.xps_district_upload_id
                JOIN request r ON r.district_id = du.district_id
                WHERE r.request_id = $1
                  AND {ACTIVE_UPLOAD_FILTER}
                  AND {scope_filter}
            ) latest
            WHERE q.xps_queue_id = latest.max_queue_id
            "#,
            scope_filter = upload_scope_filter("$2"),
        );

        let result = sqlx::query(&sql)
            .bind(request_id)
            .bind(scope.as_deref())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Data store pool closed");
    }
}
