//! MCP tool implementations.
//!
//! This module contains the float-profile tool catalog:
//! - `registry`: tool trait, catalog and dispatcher
//! - `sql`: read-only free-text SQL (`sql_query`), gated by `sql_validator`
//! - `spatial`: `nearest_float`, `location_to_floatid`, `float_trajectory`
//! - `profiles`: `profile_summary`, `metadata`
//! - `charts`: `temperature_depth_chart`, `salinity_time_series`, `multi_float_compare`
//! - `statistics`: `anomaly_detection`, `bgc_summary`, `seasonal_climatology`
//! - `export`: `profile_export`, `netcdf_export`
//! - `search`: `vector_search`

pub mod charts;
pub mod export;
pub mod geo;
pub mod input;
pub mod profiles;
pub mod registry;
pub mod search;
pub mod spatial;
pub mod sql;
pub mod sql_validator;
pub mod statistics;

use crate::error::ToolResult;
use std::path::PathBuf;
use url::Url;

pub use charts::{
    ChartRenderer, MultiFloatCompareTool, SalinityTimeSeriesTool, TemperatureDepthChartTool,
};
pub use export::{NetcdfExportTool, ProfileExportTool};
pub use profiles::{MetadataTool, ProfileSummaryTool};
pub use registry::{Dispatcher, FloatTool, ResponseEnvelope, ToolDescriptor, ToolRegistry};
pub use search::VectorSearchTool;
pub use spatial::{FloatTrajectoryTool, LocationToFloatIdTool, NearestFloatTool};
pub use sql::SqlQueryTool;
pub use statistics::{AnomalyDetectionTool, BgcSummaryTool, SeasonalClimatologyTool};

/// Settings the tools need beyond the database.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Directory export files are written to
    pub export_dir: PathBuf,
    /// QuickChart-compatible render endpoint
    pub chart_base_url: Url,
}

/// Register the full catalog, in manifest order.
pub fn build_registry(settings: &ToolSettings) -> ToolResult<ToolRegistry> {
    let charts = ChartRenderer::new(settings.chart_base_url.clone());
    let mut registry = ToolRegistry::new();

    registry.register(SqlQueryTool)?;
    registry.register(NearestFloatTool)?;
    registry.register(ProfileSummaryTool)?;
    registry.register(TemperatureDepthChartTool::new(charts.clone()))?;
    registry.register(SalinityTimeSeriesTool::new(charts.clone()))?;
    registry.register(MetadataTool)?;
    registry.register(AnomalyDetectionTool)?;
    registry.register(FloatTrajectoryTool)?;
    registry.register(ProfileExportTool::new(settings.export_dir.clone()))?;
    registry.register(NetcdfExportTool::new(settings.export_dir.clone()))?;
    registry.register(BgcSummaryTool)?;
    registry.register(VectorSearchTool)?;
    registry.register(MultiFloatCompareTool::new(charts))?;
    registry.register(SeasonalClimatologyTool)?;
    registry.register(LocationToFloatIdTool)?;

    Ok(registry)
}
