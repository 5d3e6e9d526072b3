//! Chart tools and the QuickChart URL builder.
//!
//! Charts are never rendered here. Each tool describes a Chart.js line chart
//! and hands back a URL that renders it as PNG:
//! - `temperature_depth_chart`: temperature against depth for one float
//! - `salinity_time_series`: salinity or temperature over time for one float
//! - `multi_float_compare`: mean profiles by depth for up to ten floats

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use crate::models::{JsonRow, OceanVariable, QueryParam, QueryRequest, row_f64};
use crate::tools::input::{clamp_limit, require_non_blank};
use crate::tools::registry::FloatTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

/// Largest point count a chart tool fetches.
const MAX_CHART_POINTS: u32 = 10_000;

/// Most floats one comparison may include.
const MAX_COMPARE_FLOATS: usize = 10;

/// Builds render URLs for chart configurations.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    base_url: Url,
}

impl ChartRenderer {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// URL that renders `config` as a `width` x `height` PNG.
    pub fn render(&self, config: &ChartConfig, width: u32, height: u32) -> ToolResult<String> {
        let encoded = serde_json::to_string(config)
            .map_err(|e| ToolError::handler(format!("Failed to encode chart: {}", e)))?;
        let width = width.to_string();
        let height = height.to_string();
        let url = Url::parse_with_params(
            self.base_url.as_str(),
            &[
                ("c", encoded.as_str()),
                ("format", "png"),
                ("width", width.as_str()),
                ("height", height.as_str()),
            ],
        )
        .map_err(|e| ToolError::handler(format!("Failed to build chart URL: {}", e)))?;
        Ok(url.into())
    }
}

/// Chart.js configuration, limited to what the tools draw.
#[derive(Debug, Clone, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: ChartData,
    pub options: ChartOptions,
}

impl ChartConfig {
    pub fn line(labels: Vec<JsonValue>, datasets: Vec<Dataset>) -> Self {
        Self {
            kind: "line",
            data: ChartData { labels, datasets },
            options: ChartOptions::default(),
        }
    }

    pub fn with_x_axis(mut self, axis: Axis) -> Self {
        self.options.scales.x = Some(axis);
        self
    }

    pub fn with_y_axis(mut self, axis: Axis) -> Self {
        self.options.scales.y = Some(axis);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub labels: Vec<JsonValue>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartOptions {
    pub scales: Scales,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scales {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Axis>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Axis {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<AxisTitle>,
}

impl Axis {
    pub fn reversed() -> Self {
        Self {
            reverse: Some(true),
            ..Self::default()
        }
    }

    pub fn time() -> Self {
        Self {
            kind: Some("time"),
            ..Self::default()
        }
    }

    pub fn titled(text: impl Into<String>) -> Self {
        Self {
            title: Some(AxisTitle {
                display: true,
                text: text.into(),
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisTitle {
    pub display: bool,
    pub text: String,
}

fn column_values(rows: &[JsonRow], column: &str) -> Vec<JsonValue> {
    rows.iter()
        .map(|r| r.get(column).cloned().unwrap_or(JsonValue::Null))
        .collect()
}

fn column_numbers(rows: &[JsonRow], column: &str) -> Vec<Option<f64>> {
    rows.iter().map(|r| row_f64(r, column)).collect()
}

// =============================================================================
// temperature_depth_chart
// =============================================================================

fn default_depth_chart_limit() -> u32 {
    2000
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TemperatureDepthInput {
    /// Float identifier, e.g. "2902746"
    pub float_id: String,
    /// Restrict to one profile (cycle index) of the float
    #[serde(default)]
    pub profile_index: Option<i64>,
    /// Maximum points to plot. Default: 2000, max: 10000
    #[serde(default = "default_depth_chart_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemperatureDepthOutput {
    pub float_id: String,
    /// Depth/temperature pairs ordered by depth
    pub points: Vec<JsonRow>,
    pub chart_url: String,
}

pub struct TemperatureDepthChartTool {
    charts: ChartRenderer,
}

impl TemperatureDepthChartTool {
    pub fn new(charts: ChartRenderer) -> Self {
        Self { charts }
    }
}

impl FloatTool for TemperatureDepthChartTool {
    type Input = TemperatureDepthInput;
    type Output = TemperatureDepthOutput;

    const NAME: &'static str = "temperature_depth_chart";
    const TITLE: &'static str = "Temperature vs Depth Chart";
    const DESCRIPTION: &'static str =
        "Return temperature/depth points for a float (optionally one profile) and a chart URL plotting them with depth increasing downward.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(TemperatureDepthInput {
            float_id: require_non_blank("float_id", input.float_id)?,
            limit: clamp_limit(input.limit, MAX_CHART_POINTS),
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let mut sql = String::from(
            "SELECT CAST(depth AS DOUBLE PRECISION) AS depth, \
             CAST(temperature AS DOUBLE PRECISION) AS temperature \
             FROM profiles \
             WHERE CAST(float_id AS TEXT) = $1 AND temperature IS NOT NULL",
        );
        let mut params = vec![QueryParam::from(input.float_id.as_str())];
        if let Some(index) = input.profile_index {
            params.push(QueryParam::Int(index));
            sql.push_str(" AND profile_index = $2");
        }
        params.push(QueryParam::Int(i64::from(input.limit)));
        sql.push_str(&format!(" ORDER BY depth ASC LIMIT ${}", params.len()));

        let request = QueryRequest::new(sql)
            .with_params(params)
            .with_limit(input.limit);
        let result = executor.run(&request).await?;
        debug!(float_id = %input.float_id, points = result.row_count, "Loaded depth profile");

        let chart = ChartConfig::line(
            column_values(&result.rows, "depth"),
            vec![Dataset {
                label: format!("{} temperature vs depth", input.float_id),
                data: column_numbers(&result.rows, "temperature"),
            }],
        )
        .with_y_axis(Axis::reversed())
        .with_x_axis(Axis::titled("Depth (m)"));
        let chart_url = self.charts.render(&chart, 900, 600)?;

        Ok(TemperatureDepthOutput {
            float_id: input.float_id,
            points: result.rows,
            chart_url,
        })
    }
}

// =============================================================================
// salinity_time_series
// =============================================================================

fn default_series_variable() -> OceanVariable {
    OceanVariable::Salinity
}

fn default_series_limit() -> u32 {
    1000
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TimeSeriesInput {
    /// Float identifier
    pub float_id: String,
    /// Variable to plot. Default: salinity
    #[serde(default = "default_series_variable")]
    pub variable: OceanVariable,
    /// Maximum points. Default: 1000, max: 10000
    #[serde(default = "default_series_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesOutput {
    pub float_id: String,
    pub variable: OceanVariable,
    /// `t` (timestamp) and `v` (value) ordered by time
    pub points: Vec<JsonRow>,
    pub chart_url: String,
}

pub struct SalinityTimeSeriesTool {
    charts: ChartRenderer,
}

impl SalinityTimeSeriesTool {
    pub fn new(charts: ChartRenderer) -> Self {
        Self { charts }
    }
}

impl FloatTool for SalinityTimeSeriesTool {
    type Input = TimeSeriesInput;
    type Output = TimeSeriesOutput;

    const NAME: &'static str = "salinity_time_series";
    const TITLE: &'static str = "Salinity / Variable Time Series";
    const DESCRIPTION: &'static str =
        "Return a time series of salinity or temperature for a float and a chart URL with a time axis.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(TimeSeriesInput {
            float_id: require_non_blank("float_id", input.float_id)?,
            limit: clamp_limit(input.limit, MAX_CHART_POINTS),
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let column = input.variable.column();
        let sql = format!(
            "SELECT time AS t, CAST({column} AS DOUBLE PRECISION) AS v \
             FROM profiles \
             WHERE CAST(float_id AS TEXT) = $1 AND {column} IS NOT NULL \
             ORDER BY time ASC LIMIT $2"
        );
        let request = QueryRequest::new(sql)
            .with_param(input.float_id.as_str())
            .with_param(i64::from(input.limit))
            .with_limit(input.limit);
        let result = executor.run(&request).await?;

        let chart = ChartConfig::line(
            column_values(&result.rows, "t"),
            vec![Dataset {
                label: format!("{} {} time series", input.float_id, input.variable),
                data: column_numbers(&result.rows, "v"),
            }],
        )
        .with_x_axis(Axis::time());
        let chart_url = self.charts.render(&chart, 1000, 400)?;

        Ok(TimeSeriesOutput {
            float_id: input.float_id,
            variable: input.variable,
            points: result.rows,
            chart_url,
        })
    }
}

// =============================================================================
// multi_float_compare
// =============================================================================

fn default_compare_variable() -> OceanVariable {
    OceanVariable::Temperature
}

fn default_compare_limit() -> u32 {
    2000
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MultiFloatCompareInput {
    /// Floats to compare (1 to 10)
    pub float_ids: Vec<String>,
    /// Variable to average by depth. Default: temperature
    #[serde(default = "default_compare_variable")]
    pub variable: OceanVariable,
    /// Maximum depth levels per float. Default: 2000, max: 10000
    #[serde(default = "default_compare_limit")]
    pub limit: u32,
}

/// One float's mean profile, or why it could not be loaded.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FloatComparison {
    Series { float_id: String, points: Vec<JsonRow> },
    Failed { float_id: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiFloatCompareOutput {
    pub variable: OceanVariable,
    pub comparisons: Vec<FloatComparison>,
    pub chart_url: String,
}

pub struct MultiFloatCompareTool {
    charts: ChartRenderer,
}

impl MultiFloatCompareTool {
    pub fn new(charts: ChartRenderer) -> Self {
        Self { charts }
    }
}

impl FloatTool for MultiFloatCompareTool {
    type Input = MultiFloatCompareInput;
    type Output = MultiFloatCompareOutput;

    const NAME: &'static str = "multi_float_compare";
    const TITLE: &'static str = "Multi-Float Comparison";
    const DESCRIPTION: &'static str =
        "Compare the mean depth profile of a variable across several floats and return a chart URL overlaying them.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        if input.float_ids.is_empty() || input.float_ids.len() > MAX_COMPARE_FLOATS {
            return Err(ToolError::invalid_input(format!(
                "float_ids must list between 1 and {} floats",
                MAX_COMPARE_FLOATS
            )));
        }
        let float_ids = input
            .float_ids
            .into_iter()
            .map(|id| require_non_blank("float_ids", id))
            .collect::<ToolResult<Vec<_>>>()?;
        Ok(MultiFloatCompareInput {
            float_ids,
            limit: clamp_limit(input.limit, MAX_CHART_POINTS),
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let column = input.variable.column();
        let sql = format!(
            "SELECT CAST(depth AS DOUBLE PRECISION) AS depth, \
             AVG(CAST({column} AS DOUBLE PRECISION)) AS value \
             FROM profiles \
             WHERE CAST(float_id AS TEXT) = $1 \
             GROUP BY depth ORDER BY depth LIMIT $2"
        );

        let mut comparisons = Vec::with_capacity(input.float_ids.len());
        for float_id in input.float_ids {
            let request = QueryRequest::new(sql.as_str())
                .with_param(float_id.as_str())
                .with_param(i64::from(input.limit))
                .with_limit(input.limit);
            match executor.run(&request).await {
                Ok(result) => comparisons.push(FloatComparison::Series {
                    float_id,
                    points: result.rows,
                }),
                Err(err) => {
                    warn!(float_id = %float_id, error = %err, "Comparison query failed");
                    comparisons.push(FloatComparison::Failed {
                        float_id,
                        error: err.user_message(),
                    });
                }
            }
        }

        let mut labels = None;
        let mut datasets = Vec::new();
        for comparison in &comparisons {
            if let FloatComparison::Series { float_id, points } = comparison {
                labels.get_or_insert_with(|| column_values(points, "depth"));
                datasets.push(Dataset {
                    label: float_id.clone(),
                    data: column_numbers(points, "value"),
                });
            }
        }

        let chart = ChartConfig::line(labels.unwrap_or_default(), datasets)
            .with_y_axis(Axis::reversed());
        let chart_url = self.charts.render(&chart, 1000, 600)?;

        Ok(MultiFloatCompareOutput {
            variable: input.variable,
            comparisons,
            chart_url,
        })
    }
}
