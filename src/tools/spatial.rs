//! Location tools over `profile_summaries`.
//!
//! A coarse latitude/longitude box is pushed into SQL; exact distances are
//! computed here on the returned candidates.

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use crate::models::{JsonRow, QueryParam, QueryRequest, row_f64};
use crate::tools::geo::{
    BoundingBox, approx_distance_order, degree_distance, haversine_km, search_half_width,
};
use crate::tools::input::{check_latitude, check_longitude, clamp_limit, require_non_blank};
use crate::tools::registry::FloatTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::cmp::Ordering;
use tracing::debug;

/// Candidate rows fetched for a radius search.
const MAX_CANDIDATES: u32 = 5_000;

/// Candidate rows fetched for a single-nearest lookup.
const MAX_LOOKUP_CANDIDATES: u32 = 200;

/// Half-width in degrees of the single-nearest lookup box.
const LOOKUP_HALF_WIDTH: f64 = 1.0;

const MAX_TRAJECTORY_POINTS: u32 = 10_000;

// =============================================================================
// nearest_float
// =============================================================================

fn default_radius_km() -> f64 {
    200.0
}

fn default_nearest_limit() -> u32 {
    200
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NearestFloatInput {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
    /// Search radius in kilometres. Default: 200
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// Maximum floats to return. Default: 200, max: 5000
    #[serde(default = "default_nearest_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestFloatOutput {
    /// Profiles within the radius, before `limit` is applied
    pub count: usize,
    /// Nearest first, each with `distance_km`
    pub floats: Vec<JsonRow>,
}

pub struct NearestFloatTool;

impl FloatTool for NearestFloatTool {
    type Input = NearestFloatInput;
    type Output = NearestFloatOutput;

    const NAME: &'static str = "nearest_float";
    const TITLE: &'static str = "Nearest Float Finder";
    const DESCRIPTION: &'static str =
        "Find profile summaries within radius_km of a point, nearest first, using a bounding box and haversine distance.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        if !(input.radius_km.is_finite() && input.radius_km > 0.0) {
            return Err(ToolError::invalid_input("radius_km must be a positive number"));
        }
        Ok(NearestFloatInput {
            lat: check_latitude("lat", input.lat)?,
            lon: check_longitude("lon", input.lon)?,
            radius_km: input.radius_km,
            limit: clamp_limit(input.limit, MAX_CANDIDATES),
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let bbox = BoundingBox::around(input.lat, input.lon, search_half_width(input.radius_km));
        let (predicate, mut params) = bbox.predicate(1);
        let (order, order_params) = approx_distance_order(input.lat, input.lon, params.len() + 1);
        params.extend(order_params);
        params.push(QueryParam::Int(i64::from(MAX_CANDIDATES)));
        // Closest candidates first, so a dense box cannot crowd them out
        let sql = format!(
            "SELECT profile_key, float_id, \
             CAST(latitude AS DOUBLE PRECISION) AS latitude, \
             CAST(longitude AS DOUBLE PRECISION) AS longitude, \
             n_levels, mean_temperature, mean_salinity \
             FROM profile_summaries WHERE {predicate} ORDER BY {order} LIMIT ${}",
            params.len()
        );
        let request = QueryRequest::new(sql)
            .with_params(params)
            .with_limit(MAX_CANDIDATES);
        let result = executor.run(&request).await?;

        let mut within: Vec<(f64, JsonRow)> = result
            .rows
            .into_iter()
            .filter_map(|row| {
                let lat = row_f64(&row, "latitude")?;
                let lon = row_f64(&row, "longitude")?;
                let distance = haversine_km(input.lat, input.lon, lat, lon);
                (distance <= input.radius_km).then_some((distance, row))
            })
            .collect();
        within.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        debug!(
            candidates = result.row_count,
            within = within.len(),
            "Radius search refined"
        );

        let count = within.len();
        let floats = within
            .into_iter()
            .take(input.limit as usize)
            .map(|(distance, mut row)| {
                row.insert("distance_km".to_string(), json!(distance));
                row
            })
            .collect();

        Ok(NearestFloatOutput { count, floats })
    }
}

// =============================================================================
// location_to_floatid
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LocationInput {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationOutput {
    /// Closest profile summary, or null when none lies within one degree
    pub nearest: Option<JsonRow>,
    pub distance_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct LocationToFloatIdTool;

impl FloatTool for LocationToFloatIdTool {
    type Input = LocationInput;
    type Output = LocationOutput;

    const NAME: &'static str = "location_to_floatid";
    const TITLE: &'static str = "Location to Float ID";
    const DESCRIPTION: &'static str =
        "Return the single profile summary closest to a point, searching within one degree.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(LocationInput {
            lat: check_latitude("lat", input.lat)?,
            lon: check_longitude("lon", input.lon)?,
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let bbox = BoundingBox::around(input.lat, input.lon, LOOKUP_HALF_WIDTH);
        let (predicate, mut params) = bbox.predicate(1);
        let (order, order_params) = approx_distance_order(input.lat, input.lon, params.len() + 1);
        params.extend(order_params);
        params.push(QueryParam::Int(i64::from(MAX_LOOKUP_CANDIDATES)));
        let sql = format!(
            "SELECT profile_key, float_id, \
             CAST(latitude AS DOUBLE PRECISION) AS latitude, \
             CAST(longitude AS DOUBLE PRECISION) AS longitude \
             FROM profile_summaries WHERE {predicate} ORDER BY {order} LIMIT ${}",
            params.len()
        );
        let request = QueryRequest::new(sql)
            .with_params(params)
            .with_limit(MAX_LOOKUP_CANDIDATES);
        let result = executor.run(&request).await?;

        let nearest = result
            .rows
            .into_iter()
            .filter_map(|row| {
                let lat = row_f64(&row, "latitude")?;
                let lon = row_f64(&row, "longitude")?;
                Some((degree_distance(input.lat, input.lon, lat, lon), row))
            })
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        Ok(match nearest {
            Some((distance, row)) => LocationOutput {
                nearest: Some(row),
                distance_deg: Some(distance),
                message: None,
            },
            None => LocationOutput {
                nearest: None,
                distance_deg: None,
                message: Some("no floats near location".to_string()),
            },
        })
    }
}

// =============================================================================
// float_trajectory
// =============================================================================

fn default_trajectory_limit() -> u32 {
    5000
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TrajectoryInput {
    /// Float identifier
    pub float_id: String,
    /// Maximum positions. Default: 5000, max: 10000
    #[serde(default = "default_trajectory_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryOutput {
    pub float_id: String,
    /// `t`, `lat`, `lon` ordered by time
    pub trajectory: Vec<JsonRow>,
    /// FeatureCollection with one LineString of `[lon, lat]` positions
    pub geojson: JsonValue,
}

pub struct FloatTrajectoryTool;

/// GeoJSON line through the positions that have both coordinates.
pub fn trajectory_geojson(float_id: &str, rows: &[JsonRow]) -> JsonValue {
    let coordinates: Vec<[f64; 2]> = rows
        .iter()
        .filter_map(|r| Some([row_f64(r, "lon")?, row_f64(r, "lat")?]))
        .collect();
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": coordinates },
            "properties": { "float_id": float_id },
        }],
    })
}

impl FloatTool for FloatTrajectoryTool {
    type Input = TrajectoryInput;
    type Output = TrajectoryOutput;

    const NAME: &'static str = "float_trajectory";
    const TITLE: &'static str = "Float Trajectory";
    const DESCRIPTION: &'static str =
        "Return the time-ordered positions of a float and a GeoJSON LineString of its track.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(TrajectoryInput {
            float_id: require_non_blank("float_id", input.float_id)?,
            limit: clamp_limit(input.limit, MAX_TRAJECTORY_POINTS),
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let request = QueryRequest::new(
            "SELECT time AS t, \
             CAST(latitude AS DOUBLE PRECISION) AS lat, \
             CAST(longitude AS DOUBLE PRECISION) AS lon \
             FROM profile_summaries \
             WHERE CAST(float_id AS TEXT) = $1 \
             ORDER BY time ASC LIMIT $2",
        )
        .with_param(input.float_id.as_str())
        .with_param(i64::from(input.limit))
        .with_limit(input.limit);
        let result = executor.run(&request).await?;

        let geojson = trajectory_geojson(&input.float_id, &result.rows);
        Ok(TrajectoryOutput {
            float_id: input.float_id,
            trajectory: result.rows,
            geojson,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_sanitize() {
        let ok = NearestFloatTool
            .sanitize(NearestFloatInput {
                lat: 10.0,
                lon: 20.0,
                radius_km: 50.0,
                limit: 1_000_000,
            })
            .unwrap();
        assert_eq!(ok.limit, MAX_CANDIDATES);

        let bad = NearestFloatInput {
            lat: 91.0,
            lon: 0.0,
            radius_km: 50.0,
            limit: 10,
        };
        assert!(NearestFloatTool.sanitize(bad).is_err());

        let bad = NearestFloatInput {
            lat: 0.0,
            lon: 0.0,
            radius_km: -1.0,
            limit: 10,
        };
        assert!(NearestFloatTool.sanitize(bad).is_err());
    }

    #[test]
    fn test_nearest_input_rejects_string_numbers() {
        let parsed: Result<NearestFloatInput, _> =
            serde_json::from_value(json!({"lat": "12.5", "lon": 80.0}));
        assert!(parsed.is_err());

        let parsed: NearestFloatInput = serde_json::from_value(json!({"lat": 12.5, "lon": 80})).unwrap();
        assert_eq!(parsed.radius_km, 200.0);
        assert_eq!(parsed.limit, 200);
    }

    #[test]
    fn test_trajectory_geojson() {
        let rows: Vec<JsonRow> = vec![
            json!({"t": "2024-01-01T00:00:00Z", "lat": 10.0, "lon": 60.0}),
            json!({"t": "2024-01-11T00:00:00Z", "lat": null, "lon": 61.0}),
            json!({"t": "2024-01-21T00:00:00Z", "lat": 11.0, "lon": 62.0}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();

        let geojson = trajectory_geojson("2902746", &rows);
        assert_eq!(geojson["type"], json!("FeatureCollection"));
        let feature = &geojson["features"][0];
        assert_eq!(feature["geometry"]["type"], json!("LineString"));
        assert_eq!(
            feature["geometry"]["coordinates"],
            json!([[60.0, 10.0], [62.0, 11.0]])
        );
        assert_eq!(feature["properties"]["float_id"], json!("2902746"));
    }
}
