//! Postgres Record Store
//!
//! PostgreSQL connection pooling with deadpool-postgres and the Postgres
//! implementation of [`RecordStore`].
//!
//! Every statement runs on its own pooled connection. No transaction is held
//! across an upstream call; the orchestrator serializes the writes for one
//! identity inside its single-flight guard.

use crate::error::{ApiError, ApiResult};
use ::async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use insight_core::{
    new_entity_id, AnalysisRecord, AnalysisResult, EntityId, IdentityKey, ProfileRecord,
    ProfileSnapshot, StorageError, StoreStats, TraitScores,
};
use insight_storage::RecordStore;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

/// Schema applied by [`DbClient::migrate`].
const SCHEMA_SQL: &str = include_str!("../migrations/0001_create_profiles.sql");

const PROFILE_COLUMNS: &str =
    "profile_id, identity_key, external_id, raw_payload, trait_scores, created_at, updated_at";

const ANALYSIS_COLUMNS: &str =
    "analysis_id, profile_id, summary, strengths, weaknesses, raw_response, created_at, updated_at";

// ============================================================================
// POOL CONFIGURATION
// ============================================================================

/// Connection settings for the Postgres record store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// When false the service runs without a record store
    pub enabled: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "insightprofile".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 5,
            timeout: Duration::from_secs(30),
            enabled: true,
        }
    }
}

impl DbConfig {
    /// Read `INSIGHT_DB_*`, falling back to the defaults per field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("INSIGHT_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("INSIGHT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("INSIGHT_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("INSIGHT_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("INSIGHT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("INSIGHT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("INSIGHT_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            enabled: std::env::var("INSIGHT_DB_ENABLED")
                .map(|s| s.to_lowercase() != "false" && s != "0")
                .unwrap_or(defaults.enabled),
        }
    }

    /// Build the deadpool pool from these settings.
    ///
    /// No connection is opened here; the first checkout connects.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: Some(self.timeout),
            },
            ..Default::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::store_unavailable(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// DATABASE CLIENT
// ============================================================================

/// Postgres-backed record store.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build the pool without opening a connection.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Connect, verify the server answers, and apply the schema.
    pub async fn connect(config: &DbConfig) -> ApiResult<Self> {
        let client = Self::from_config(config)?;
        client.migrate().await?;
        Ok(client)
    }

    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        tracing::info!("Database schema applied");
        Ok(())
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool.get().await.map_err(|e| unavailable("pool", e))
    }
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("DbClient")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn unavailable(operation: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable {
        reason: format!("{}: {}", operation, err),
    }
}

fn decode<T: serde::de::DeserializeOwned>(field: &str, value: JsonValue) -> Result<T, StorageError> {
    serde_json::from_value(value).map_err(|e| StorageError::Serialization {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn encode<T: serde::Serialize>(field: &str, value: &T) -> Result<JsonValue, StorageError> {
    serde_json::to_value(value).map_err(|e| StorageError::Serialization {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn profile_from_row(row: &Row) -> Result<ProfileRecord, StorageError> {
    let trait_scores: TraitScores = decode("trait_scores", row.get("trait_scores"))?;
    Ok(ProfileRecord {
        profile_id: row.get("profile_id"),
        identity_key: row.get("identity_key"),
        external_id: row.get("external_id"),
        raw_payload: row.get("raw_payload"),
        trait_scores,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn analysis_from_row(row: &Row) -> Result<AnalysisRecord, StorageError> {
    Ok(AnalysisRecord {
        analysis_id: row.get("analysis_id"),
        profile_id: row.get("profile_id"),
        summary: row.get("summary"),
        strengths: decode("strengths", row.get("strengths"))?,
        weaknesses: decode("weaknesses", row.get("weaknesses"))?,
        raw_response: row.get("raw_response"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// RECORD STORE
// ============================================================================

#[async_trait]
impl RecordStore for DbClient {
    async fn find_profile(&self, key: &IdentityKey) -> Result<Option<ProfileRecord>, StorageError> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE identity_key = $1");
        let row = conn
            .query_opt(sql.as_str(), &[&key.as_str()])
            .await
            .map_err(|e| unavailable("find_profile", e))?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn latest_analysis(
        &self,
        profile_id: EntityId,
    ) -> Result<Option<AnalysisRecord>, StorageError> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE profile_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = conn
            .query_opt(sql.as_str(), &[&profile_id])
            .await
            .map_err(|e| unavailable("latest_analysis", e))?;
        row.as_ref().map(analysis_from_row).transpose()
    }

    async fn list_profiles(&self, limit: usize) -> Result<Vec<ProfileRecord>, StorageError> {
        let conn = self.get_conn().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC LIMIT $1"
        );
        let rows = conn
            .query(sql.as_str(), &[&limit])
            .await
            .map_err(|e| unavailable("list_profiles", e))?;
        rows.iter().map(profile_from_row).collect()
    }

    async fn stats(&self, window: Duration) -> Result<StoreStats, StorageError> {
        let now = Utc::now();
        let window_delta = TimeDelta::from_std(window).map_err(|e| StorageError::Serialization {
            field: "window".to_string(),
            reason: e.to_string(),
        })?;
        let cutoff = now - window_delta;

        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT \
                    (SELECT COUNT(*) FROM profiles) AS total_profiles, \
                    (SELECT COUNT(*) FROM analyses) AS total_analyses, \
                    (SELECT COUNT(*) FROM profiles WHERE created_at >= $1) AS recent_profiles",
                &[&cutoff],
            )
            .await
            .map_err(|e| unavailable("stats", e))?;

        let count = |column: &str| -> u64 { row.get::<_, i64>(column).max(0) as u64 };
        Ok(StoreStats {
            total_profiles: count("total_profiles"),
            total_analyses: count("total_analyses"),
            recent_profiles: count("recent_profiles"),
            window_days: window_delta.num_days(),
            generated_at: now,
        })
    }

    async fn upsert_profile(
        &self,
        key: &IdentityKey,
        snapshot: &ProfileSnapshot,
    ) -> Result<ProfileRecord, StorageError> {
        let conn = self.get_conn().await?;
        let trait_scores = encode("trait_scores", &snapshot.trait_scores)?;
        let sql = format!(
            "INSERT INTO profiles (profile_id, identity_key, external_id, raw_payload, trait_scores) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (identity_key) DO UPDATE SET \
                external_id = EXCLUDED.external_id, \
                raw_payload = EXCLUDED.raw_payload, \
                trait_scores = EXCLUDED.trait_scores, \
                updated_at = NOW() \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &new_entity_id(),
                    &key.as_str(),
                    &snapshot.external_id,
                    &snapshot.raw_payload,
                    &trait_scores,
                ],
            )
            .await
            .map_err(|e| unavailable("upsert_profile", e))?;
        profile_from_row(&row)
    }

    async fn insert_analysis(
        &self,
        profile_id: EntityId,
        result: &AnalysisResult,
    ) -> Result<AnalysisRecord, StorageError> {
        let conn = self.get_conn().await?;
        let strengths = encode("strengths", &result.strengths)?;
        let weaknesses = encode("weaknesses", &result.weaknesses)?;
        let sql = format!(
            "INSERT INTO analyses (analysis_id, profile_id, summary, strengths, weaknesses, raw_response) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ANALYSIS_COLUMNS}"
        );
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &new_entity_id(),
                    &profile_id,
                    &result.summary,
                    &strengths,
                    &weaknesses,
                    &result.raw_response,
                ],
            )
            .await
            .map_err(|e| unavailable("insert_analysis", e))?;
        analysis_from_row(&row)
    }

    async fn delete(&self, key: &IdentityKey) -> Result<u64, StorageError> {
        let conn = self.get_conn().await?;
        // Analyses go with the profile through ON DELETE CASCADE.
        conn.execute("DELETE FROM profiles WHERE identity_key = $1", &[&key.as_str()])
            .await
            .map_err(|e| unavailable("delete", e))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| unavailable("ping", e))
    }
}
