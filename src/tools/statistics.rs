//! Statistical tools over raw `profiles` rows.
//!
//! Aggregates are pulled as `AVG(x)`, `AVG(x*x)` and `COUNT(x)` so the same SQL
//! runs on PostgreSQL and SQLite; standard deviations are derived here
//! (population form).

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use crate::models::{
    BgcVariable, JsonRow, OceanVariable, QueryParam, QueryRequest, row_f64, row_i64,
};
use crate::tools::input::{
    check_latitude, check_longitude, clamp_limit, optional_non_blank, population_std,
};
use crate::tools::registry::FloatTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// `AVG`, `AVG` of squares and `COUNT` of a column, as `{alias}_mean`,
/// `{alias}_mean_sq` and `{alias}_n`.
fn moment_columns(column: &str, alias: &str) -> String {
    format!(
        "AVG(CAST({column} AS DOUBLE PRECISION)) AS {alias}_mean, \
         AVG(CAST({column} AS DOUBLE PRECISION) * CAST({column} AS DOUBLE PRECISION)) AS {alias}_mean_sq, \
         COUNT({column}) AS {alias}_n"
    )
}

/// Mean, population standard deviation and count of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Moments {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub n: i64,
}

impl Moments {
    fn from_row(row: &JsonRow, alias: &str) -> Self {
        let mean = row_f64(row, &format!("{alias}_mean"));
        let mean_sq = row_f64(row, &format!("{alias}_mean_sq"));
        let n = row_i64(row, &format!("{alias}_n")).unwrap_or(0);
        Self {
            mean: if n > 0 { mean } else { None },
            std: population_std(mean, mean_sq, n),
            n,
        }
    }

    /// Bounds outside which a value's |z| exceeds `threshold`. `None` when the
    /// spread is zero or unknown, so nothing can be flagged.
    fn bounds(&self, threshold: f64) -> Option<(f64, f64)> {
        match (self.mean, self.std) {
            (Some(mean), Some(std)) if std > 0.0 => {
                Some((mean - threshold * std, mean + threshold * std))
            }
            _ => None,
        }
    }

    fn z_score(&self, value: Option<f64>) -> Option<f64> {
        match (value, self.mean, self.std) {
            (Some(v), Some(mean), Some(std)) if std > 0.0 => Some((v - mean) / std),
            _ => None,
        }
    }
}

// =============================================================================
// anomaly_detection
// =============================================================================

fn default_z_threshold() -> f64 {
    3.0
}

fn default_anomaly_limit() -> u32 {
    10_000
}

const MAX_ANOMALIES: u32 = 10_000;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnomalyInput {
    /// Restrict to one float; omit to scan the whole store
    #[serde(default)]
    pub float_id: Option<String>,
    /// Flag values whose |z-score| exceeds this. Default: 3
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
    /// Maximum anomalies. Default and max: 10000
    #[serde(default = "default_anomaly_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyStats {
    pub temperature: Moments,
    pub salinity: Moments,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyOutput {
    pub stats: AnomalyStats,
    /// Flagged rows with `temp_z` / `sal_z` (null when undefined)
    pub anomalies: Vec<JsonRow>,
}

pub struct AnomalyDetectionTool;

impl FloatTool for AnomalyDetectionTool {
    type Input = AnomalyInput;
    type Output = AnomalyOutput;

    const NAME: &'static str = "anomaly_detection";
    const TITLE: &'static str = "Anomaly Detection";
    const DESCRIPTION: &'static str =
        "Flag temperature or salinity measurements whose z-score exceeds a threshold, for one float or the whole store.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        if !(input.z_threshold.is_finite() && input.z_threshold > 0.0) {
            return Err(ToolError::invalid_input("z_threshold must be a positive number"));
        }
        Ok(AnomalyInput {
            float_id: optional_non_blank("float_id", input.float_id)?,
            limit: clamp_limit(input.limit, MAX_ANOMALIES),
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let mut params = Vec::new();
        let mut filter = String::new();
        if let Some(id) = &input.float_id {
            params.push(QueryParam::from(id.as_str()));
            filter.push_str("CAST(float_id AS TEXT) = $1 AND ");
        }

        let stats_sql = format!(
            "SELECT {}, {} FROM profiles{}",
            moment_columns("temperature", "temp"),
            moment_columns("salinity", "sal"),
            if input.float_id.is_some() {
                " WHERE CAST(float_id AS TEXT) = $1"
            } else {
                ""
            }
        );
        let stats_result = executor.execute(&stats_sql, &params).await?;
        let stats_row = stats_result.first().cloned().unwrap_or_default();
        let stats = AnomalyStats {
            temperature: Moments::from_row(&stats_row, "temp"),
            salinity: Moments::from_row(&stats_row, "sal"),
        };

        let temp_bounds = stats.temperature.bounds(input.z_threshold);
        let sal_bounds = stats.salinity.bounds(input.z_threshold);
        if temp_bounds.is_none() && sal_bounds.is_none() {
            debug!("No variable has spread; nothing to flag");
            return Ok(AnomalyOutput {
                stats,
                anomalies: Vec::new(),
            });
        }

        let mut next = params.len() + 1;
        let mut clause = |column: &str, bounds: Option<(f64, f64)>, params: &mut Vec<QueryParam>| {
            let (lo, hi) = bounds.unwrap_or((0.0, 0.0));
            params.push(QueryParam::Bool(bounds.is_some()));
            params.push(QueryParam::Float(lo));
            params.push(QueryParam::Float(hi));
            let sql = format!(
                "(${} AND ({column} < ${} OR {column} > ${}))",
                next,
                next + 1,
                next + 2
            );
            next += 3;
            sql
        };
        let temp_clause = clause("temperature", temp_bounds, &mut params);
        let sal_clause = clause("salinity", sal_bounds, &mut params);
        params.push(QueryParam::Int(i64::from(input.limit)));

        let rows_sql = format!(
            "SELECT CAST(latitude AS DOUBLE PRECISION) AS latitude, \
             CAST(longitude AS DOUBLE PRECISION) AS longitude, time, \
             CAST(depth AS DOUBLE PRECISION) AS depth, \
             CAST(temperature AS DOUBLE PRECISION) AS temperature, \
             CAST(salinity AS DOUBLE PRECISION) AS salinity \
             FROM profiles WHERE {filter}({temp_clause} OR {sal_clause}) LIMIT ${}",
            params.len()
        );
        let request = QueryRequest::new(rows_sql)
            .with_params(params)
            .with_limit(input.limit);
        let result = executor.run(&request).await?;

        // The WHERE clause already selected outliers; LIMIT counts only them
        let anomalies = result
            .rows
            .into_iter()
            .map(|mut row| {
                let temp_z = stats.temperature.z_score(row_f64(&row, "temperature"));
                let sal_z = stats.salinity.z_score(row_f64(&row, "salinity"));
                row.insert("temp_z".to_string(), json!(temp_z));
                row.insert("sal_z".to_string(), json!(sal_z));
                row
            })
            .collect();

        Ok(AnomalyOutput { stats, anomalies })
    }
}

// =============================================================================
// bgc_summary
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BgcSummaryInput {
    /// Restrict to one float; omit to summarize the whole store
    #[serde(default)]
    pub float_id: Option<String>,
    /// Variables to summarize. Default: ["oxygen", "NO3", "CHLA"]
    #[serde(default = "BgcVariable::defaults")]
    pub variable_list: Vec<BgcVariable>,
}

/// Statistics for one variable, or why they are unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableSummary {
    Stats {
        mean: Option<f64>,
        std: Option<f64>,
        count: i64,
    },
    Unavailable {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BgcSummaryOutput {
    pub float_id: Option<String>,
    /// Keyed by variable name as requested
    pub summary: BTreeMap<&'static str, VariableSummary>,
}

pub struct BgcSummaryTool;

impl FloatTool for BgcSummaryTool {
    type Input = BgcSummaryInput;
    type Output = BgcSummaryOutput;

    const NAME: &'static str = "bgc_summary";
    const TITLE: &'static str = "BGC Summary";
    const DESCRIPTION: &'static str =
        "Summarize biogeochemical variables (mean, standard deviation, count). Variables the store lacks are reported per variable instead of failing the call.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        if input.variable_list.is_empty() {
            return Err(ToolError::invalid_input("variable_list must not be empty"));
        }
        Ok(BgcSummaryInput {
            float_id: optional_non_blank("float_id", input.float_id)?,
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let (filter, params) = match &input.float_id {
            Some(id) => (
                " WHERE CAST(float_id AS TEXT) = $1",
                vec![QueryParam::from(id.as_str())],
            ),
            None => ("", Vec::new()),
        };

        let mut summary = BTreeMap::new();
        for variable in &input.variable_list {
            let sql = format!(
                "SELECT {} FROM profiles{filter}",
                moment_columns(variable.column(), "v")
            );
            let entry = match executor.execute(&sql, &params).await {
                Ok(result) => {
                    let moments = result
                        .first()
                        .map(|row| Moments::from_row(row, "v"))
                        .unwrap_or(Moments {
                            mean: None,
                            std: None,
                            n: 0,
                        });
                    VariableSummary::Stats {
                        mean: moments.mean,
                        std: moments.std,
                        count: moments.n,
                    }
                }
                Err(err) => {
                    warn!(variable = variable.label(), error = %err, "BGC variable unavailable");
                    VariableSummary::Unavailable {
                        error: "variable missing or query error".to_string(),
                    }
                }
            };
            summary.insert(variable.label(), entry);
        }

        Ok(BgcSummaryOutput {
            float_id: input.float_id,
            summary,
        })
    }
}

// =============================================================================
// seasonal_climatology
// =============================================================================

/// Meteorological season of a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Season {
    #[serde(rename = "DJF")]
    Djf,
    #[serde(rename = "MAM")]
    Mam,
    #[serde(rename = "JJA")]
    Jja,
    #[serde(rename = "SON")]
    Son,
}

impl Season {
    pub fn from_month(month: i64) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Self::Djf),
            3..=5 => Some(Self::Mam),
            6..=8 => Some(Self::Jja),
            9..=11 => Some(Self::Son),
            _ => None,
        }
    }
}

fn default_climatology_variable() -> OceanVariable {
    OceanVariable::Temperature
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClimatologyInput {
    /// Restrict to one float
    #[serde(default)]
    pub float_id: Option<String>,
    /// Default: temperature
    #[serde(default = "default_climatology_variable")]
    pub variable: OceanVariable,
    #[serde(default)]
    pub lat_min: Option<f64>,
    #[serde(default)]
    pub lat_max: Option<f64>,
    #[serde(default)]
    pub lon_min: Option<f64>,
    #[serde(default)]
    pub lon_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonStats {
    pub season: Season,
    pub mean: f64,
    pub std: f64,
    pub n: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClimatologyOutput {
    pub variable: OceanVariable,
    /// Seasons with data, in DJF, MAM, JJA, SON order
    pub climatology: Vec<SeasonStats>,
}

/// Running totals for one season.
#[derive(Debug, Default, Clone, Copy)]
struct SeasonTotals {
    sum: f64,
    sum_sq: f64,
    n: i64,
}

/// Fold per-month moments (`month`, `mean`, `mean_sq`, `n`) into seasons.
pub fn fold_seasons(rows: &[JsonRow]) -> Vec<SeasonStats> {
    let mut totals: BTreeMap<Season, SeasonTotals> = BTreeMap::new();
    for row in rows {
        let Some(season) = row_i64(row, "month").and_then(Season::from_month) else {
            continue;
        };
        let n = row_i64(row, "n").unwrap_or(0);
        let (Some(mean), Some(mean_sq)) = (row_f64(row, "mean"), row_f64(row, "mean_sq")) else {
            continue;
        };
        if n <= 0 {
            continue;
        }
        let entry = totals.entry(season).or_default();
        entry.sum += mean * n as f64;
        entry.sum_sq += mean_sq * n as f64;
        entry.n += n;
    }

    totals
        .into_iter()
        .map(|(season, t)| {
            let mean = t.sum / t.n as f64;
            let std = population_std(Some(mean), Some(t.sum_sq / t.n as f64), t.n).unwrap_or(0.0);
            SeasonStats {
                season,
                mean,
                std,
                n: t.n,
            }
        })
        .collect()
}

pub struct SeasonalClimatologyTool;

impl FloatTool for SeasonalClimatologyTool {
    type Input = ClimatologyInput;
    type Output = ClimatologyOutput;

    const NAME: &'static str = "seasonal_climatology";
    const TITLE: &'static str = "Seasonal Climatology";
    const DESCRIPTION: &'static str =
        "Compute seasonal (DJF/MAM/JJA/SON) mean, standard deviation and count of temperature or salinity for a float or a latitude/longitude box.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        let lat_min = input.lat_min.map(|v| check_latitude("lat_min", v)).transpose()?;
        let lat_max = input.lat_max.map(|v| check_latitude("lat_max", v)).transpose()?;
        let lon_min = input.lon_min.map(|v| check_longitude("lon_min", v)).transpose()?;
        let lon_max = input.lon_max.map(|v| check_longitude("lon_max", v)).transpose()?;
        if let (Some(lo), Some(hi)) = (lat_min, lat_max) {
            if lo > hi {
                return Err(ToolError::invalid_input("lat_min must not exceed lat_max"));
            }
        }
        if let (Some(lo), Some(hi)) = (lon_min, lon_max) {
            if lo > hi {
                return Err(ToolError::invalid_input("lon_min must not exceed lon_max"));
            }
        }
        Ok(ClimatologyInput {
            float_id: optional_non_blank("float_id", input.float_id)?,
            variable: input.variable,
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let column = input.variable.column();
        let mut conditions = vec![format!("{column} IS NOT NULL")];
        let mut params = Vec::new();
        if let Some(id) = &input.float_id {
            params.push(QueryParam::from(id.as_str()));
            conditions.push(format!("CAST(float_id AS TEXT) = ${}", params.len()));
        }
        let bounds = [
            ("latitude >=", input.lat_min),
            ("latitude <=", input.lat_max),
            ("longitude >=", input.lon_min),
            ("longitude <=", input.lon_max),
        ];
        for (condition, value) in bounds {
            if let Some(v) = value {
                params.push(QueryParam::Float(v));
                conditions.push(format!("{condition} ${}", params.len()));
            }
        }

        let sql = format!(
            "SELECT {} AS month, \
             AVG(CAST({column} AS DOUBLE PRECISION)) AS mean, \
             AVG(CAST({column} AS DOUBLE PRECISION) * CAST({column} AS DOUBLE PRECISION)) AS mean_sq, \
             COUNT({column}) AS n \
             FROM profiles WHERE {} GROUP BY 1",
            executor.db_type().month_expr("time"),
            conditions.join(" AND ")
        );
        let result = executor.execute(&sql, &params).await?;

        Ok(ClimatologyOutput {
            variable: input.variable,
            climatology: fold_seasons(&result.rows),
        })
    }
}
