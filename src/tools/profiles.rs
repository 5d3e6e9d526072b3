//! Summary lookups: `profile_summary` and `metadata`.

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use crate::models::{JsonRow, QueryRequest, row_i64};
use crate::tools::input::{clamp_limit, optional_non_blank};
use crate::tools::registry::FloatTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const SUMMARY_COLUMNS: &str = "profile_key, float_id, time, latitude, longitude, n_levels, \
     min_depth, max_depth, mean_temperature, mean_salinity, temp_surface, sal_surface, \
     variables, raw_metadata";

const MAX_SUMMARIES: u32 = 10_000;
const MAX_SAMPLES: u32 = 50;

// =============================================================================
// profile_summary
// =============================================================================

fn default_summary_limit() -> u32 {
    200
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProfileSummaryInput {
    /// Float identifier. Either this or profile_key is required
    #[serde(default)]
    pub float_id: Option<String>,
    /// Exact profile key; takes precedence over float_id
    #[serde(default)]
    pub profile_key: Option<String>,
    /// Maximum summaries. Default: 200, max: 10000
    #[serde(default = "default_summary_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummaryOutput {
    /// Newest first
    pub summaries: Vec<JsonRow>,
}

pub struct ProfileSummaryTool;

impl FloatTool for ProfileSummaryTool {
    type Input = ProfileSummaryInput;
    type Output = ProfileSummaryOutput;

    const NAME: &'static str = "profile_summary";
    const TITLE: &'static str = "Profile Summary";
    const DESCRIPTION: &'static str =
        "Return per-profile summary rows (position, depth range, mean and surface temperature/salinity) for a float or a single profile key, newest first.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        let float_id = optional_non_blank("float_id", input.float_id)?;
        let profile_key = optional_non_blank("profile_key", input.profile_key)?;
        if float_id.is_none() && profile_key.is_none() {
            return Err(ToolError::invalid_input("float_id or profile_key required"));
        }
        Ok(ProfileSummaryInput {
            float_id,
            profile_key,
            limit: clamp_limit(input.limit, MAX_SUMMARIES),
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let (filter, value) = match (input.profile_key, input.float_id) {
            (Some(key), _) => ("profile_key = $1", key),
            (None, Some(id)) => ("CAST(float_id AS TEXT) = $1", id),
            (None, None) => return Err(ToolError::invalid_input("float_id or profile_key required")),
        };
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM profile_summaries WHERE {filter} ORDER BY time DESC LIMIT $2"
        );
        let request = QueryRequest::new(sql)
            .with_param(value)
            .with_param(i64::from(input.limit))
            .with_limit(input.limit);
        let result = executor.run(&request).await?;
        Ok(ProfileSummaryOutput {
            summaries: result.rows,
        })
    }
}

// =============================================================================
// metadata
// =============================================================================

fn default_sample_limit() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MetadataInput {
    /// Number of sample summaries with raw metadata. Default: 3, max: 50
    #[serde(default = "default_sample_limit")]
    pub sample_limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Rows in `profiles`
    pub profiles: i64,
    /// Distinct float ids in `profiles`
    pub floats: i64,
    pub first_seen: JsonValue,
    pub last_seen: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataOutput {
    pub stats: StoreStats,
    pub samples: Vec<JsonRow>,
}

pub struct MetadataTool;

impl FloatTool for MetadataTool {
    type Input = MetadataInput;
    type Output = MetadataOutput;

    const NAME: &'static str = "metadata";
    const TITLE: &'static str = "Store Metadata";
    const DESCRIPTION: &'static str =
        "Return store-level counts (profiles, floats), the observed time range and a few sample summaries with raw metadata.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(MetadataInput {
            sample_limit: clamp_limit(input.sample_limit, MAX_SAMPLES),
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let counts = executor
            .execute(
                "SELECT COUNT(*) AS profiles, \
                 COUNT(DISTINCT CAST(float_id AS TEXT)) AS floats, \
                 MIN(time) AS first_seen, MAX(time) AS last_seen \
                 FROM profiles",
                &[],
            )
            .await?;
        let row = counts.first().cloned().unwrap_or_default();
        let stats = StoreStats {
            profiles: row_i64(&row, "profiles").unwrap_or(0),
            floats: row_i64(&row, "floats").unwrap_or(0),
            first_seen: row.get("first_seen").cloned().unwrap_or(JsonValue::Null),
            last_seen: row.get("last_seen").cloned().unwrap_or(JsonValue::Null),
        };

        let request = QueryRequest::new(
            "SELECT profile_key, float_id, raw_metadata FROM profile_summaries LIMIT $1",
        )
        .with_param(i64::from(input.sample_limit))
        .with_limit(input.sample_limit);
        let samples = executor.run(&request).await?;

        Ok(MetadataOutput {
            stats,
            samples: samples.rows,
        })
    }
}
