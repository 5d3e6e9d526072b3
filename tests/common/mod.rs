//! Shared fixtures: a temporary SQLite profile store behind a full dispatcher.

#![allow(dead_code)]

use floatchat_mcp::db::{ConnectionManager, DbPool, PoolSettings, QueryExecutor};
use floatchat_mcp::tools::{Dispatcher, ResponseEnvelope, ToolSettings, build_registry};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

pub const CHART_BASE: &str = "https://quickchart.io/chart";

const SCHEMA: &[&str] = &[
    "CREATE TABLE profiles (
        id INTEGER PRIMARY KEY,
        float_id TEXT,
        profile_index INTEGER,
        cycle INTEGER,
        time TEXT,
        latitude REAL,
        longitude REAL,
        depth REAL,
        temperature REAL,
        salinity REAL,
        qc TEXT,
        source_file TEXT,
        raw_metadata TEXT
    )",
    "CREATE TABLE profile_summaries (
        id INTEGER PRIMARY KEY,
        profile_key TEXT UNIQUE,
        float_id TEXT,
        time TEXT,
        latitude REAL,
        longitude REAL,
        n_levels INTEGER,
        min_depth REAL,
        max_depth REAL,
        mean_temperature REAL,
        mean_salinity REAL,
        temp_surface REAL,
        sal_surface REAL,
        variables TEXT,
        raw_metadata TEXT
    )",
];

/// A store on disk plus everything needed to call tools against it.
pub struct TestStore {
    /// Holds the database file and the export directory
    pub dir: TempDir,
    pub manager: Arc<ConnectionManager>,
    pub dispatcher: Dispatcher,
}

impl TestStore {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("argo.db").display());
        let manager = Arc::new(
            ConnectionManager::connect(&url, PoolSettings::default())
                .await
                .unwrap(),
        );

        let settings = ToolSettings {
            export_dir: dir.path().join("exports"),
            chart_base_url: url::Url::parse(CHART_BASE).unwrap(),
        };
        let registry = build_registry(&settings).unwrap();
        let dispatcher = Dispatcher::new(registry, QueryExecutor::new(Arc::clone(&manager)));

        let store = Self {
            dir,
            manager,
            dispatcher,
        };
        for statement in SCHEMA {
            sqlx::query(statement).execute(&store.pool().await).await.unwrap();
        }
        store
    }

    pub async fn pool(&self) -> SqlitePool {
        match self.manager.get_pool().await.pool {
            DbPool::SQLite(pool) => pool,
            DbPool::Postgres(_) => panic!("test store is SQLite"),
        }
    }

    /// Insert one measurement level.
    pub async fn add_level(&self, level: Level<'_>) {
        sqlx::query(
            "INSERT INTO profiles (float_id, profile_index, cycle, time, latitude, longitude, \
             depth, temperature, salinity, qc, source_file, raw_metadata) \
             VALUES ($1, $2, $2, $3, $4, $5, $6, $7, $8, '1', $9, '{}')",
        )
        .bind(level.float_id)
        .bind(level.profile_index)
        .bind(level.time)
        .bind(level.lat)
        .bind(level.lon)
        .bind(level.depth)
        .bind(level.temperature)
        .bind(level.salinity)
        .bind(level.source_file)
        .execute(&self.pool().await)
        .await
        .unwrap();
    }

    /// Insert one profile summary.
    pub async fn add_summary(&self, profile_key: &str, float_id: &str, time: &str, lat: f64, lon: f64) {
        sqlx::query(
            "INSERT INTO profile_summaries (profile_key, float_id, time, latitude, longitude, \
             n_levels, min_depth, max_depth, mean_temperature, mean_salinity, temp_surface, \
             sal_surface, variables, raw_metadata) \
             VALUES ($1, $2, $3, $4, $5, 10, 5.0, 1000.0, 12.5, 35.1, 28.0, 34.9, \
             'temperature,salinity', '{\"platform\": \"APEX\"}')",
        )
        .bind(profile_key)
        .bind(float_id)
        .bind(time)
        .bind(lat)
        .bind(lon)
        .execute(&self.pool().await)
        .await
        .unwrap();
    }

    /// Insert `count` summaries of one float at the same position, keyed
    /// `{prefix}_{n}.nc:1`.
    pub async fn add_summaries_at(&self, prefix: &str, float_id: &str, count: i64, lat: f64, lon: f64) {
        sqlx::query(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < $1) \
             INSERT INTO profile_summaries (profile_key, float_id, time, latitude, longitude) \
             SELECT $2 || '_' || i || '.nc:1', $3, '2024-01-01T00:00:00Z', $4, $5 FROM n",
        )
        .bind(count)
        .bind(prefix)
        .bind(float_id)
        .bind(lat)
        .bind(lon)
        .execute(&self.pool().await)
        .await
        .unwrap();
    }

    /// Dispatch a call with JSON arguments.
    pub async fn call(&self, tool: &str, arguments: JsonValue) -> ResponseEnvelope {
        let arguments = arguments.as_object().cloned().unwrap_or_default();
        self.dispatcher.dispatch(tool, arguments).await
    }

    /// Dispatch a call that must succeed and return its payload.
    pub async fn call_ok(&self, tool: &str, arguments: JsonValue) -> JsonValue {
        match self.call(tool, arguments).await {
            ResponseEnvelope::Success(payload) => payload,
            ResponseEnvelope::Failure { error } => panic!("{tool} failed: {error}"),
        }
    }

    /// Dispatch a call that must fail and return its error text.
    pub async fn call_err(&self, tool: &str, arguments: JsonValue) -> String {
        match self.call(tool, arguments).await {
            ResponseEnvelope::Success(payload) => panic!("{tool} unexpectedly succeeded: {payload}"),
            ResponseEnvelope::Failure { error } => error,
        }
    }
}

/// One row of `profiles`.
#[derive(Debug, Clone, Copy)]
pub struct Level<'a> {
    pub float_id: &'a str,
    pub profile_index: i64,
    pub time: &'a str,
    pub lat: f64,
    pub lon: f64,
    pub depth: f64,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    pub source_file: &'a str,
}

impl<'a> Level<'a> {
    pub fn new(float_id: &'a str, time: &'a str, depth: f64, temperature: f64, salinity: f64) -> Self {
        Self {
            float_id,
            profile_index: 1,
            time,
            lat: 10.0,
            lon: 60.0,
            depth,
            temperature: Some(temperature),
            salinity: Some(salinity),
            source_file: "R2902746_001.nc",
        }
    }
}
