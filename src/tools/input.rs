//! Validation helpers shared by tool inputs.

use crate::error::{ToolError, ToolResult};

/// Clamp a requested row limit into `[1, max]`.
pub fn clamp_limit(limit: u32, max: u32) -> u32 {
    limit.clamp(1, max)
}

/// Trim a required identifier; blank values are rejected.
pub fn require_non_blank(field: &str, value: String) -> ToolResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::invalid_input(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Like [`require_non_blank`] for optional identifiers.
pub fn optional_non_blank(field: &str, value: Option<String>) -> ToolResult<Option<String>> {
    value.map(|v| require_non_blank(field, v)).transpose()
}

pub fn check_latitude(field: &str, lat: f64) -> ToolResult<f64> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ToolError::invalid_input(format!(
            "{field} must be between -90 and 90, got {lat}"
        )));
    }
    Ok(lat)
}

pub fn check_longitude(field: &str, lon: f64) -> ToolResult<f64> {
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ToolError::invalid_input(format!(
            "{field} must be between -180 and 180, got {lon}"
        )));
    }
    Ok(lon)
}

/// Population standard deviation from `AVG(x)`, `AVG(x*x)` and `COUNT(x)`.
///
/// Returns `None` when there is no data. Rounding can push the variance
/// slightly below zero for constant columns; that is reported as 0.
pub fn population_std(mean: Option<f64>, mean_sq: Option<f64>, n: i64) -> Option<f64> {
    if n <= 0 {
        return None;
    }
    let variance = mean_sq? - mean? * mean?;
    let std = variance.max(0.0).sqrt();
    std.is_finite().then_some(std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0, 100), 1);
        assert_eq!(clamp_limit(50, 100), 50);
        assert_eq!(clamp_limit(5_000, 100), 100);
    }

    #[test]
    fn test_require_non_blank() {
        assert_eq!(require_non_blank("float_id", " 2902746 ".into()).unwrap(), "2902746");
        assert!(require_non_blank("float_id", "   ".into()).is_err());
        assert_eq!(optional_non_blank("float_id", None).unwrap(), None);
        assert!(optional_non_blank("float_id", Some(String::new())).is_err());
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(check_latitude("lat", 90.0).is_ok());
        assert!(check_latitude("lat", -90.5).is_err());
        assert!(check_latitude("lat", f64::NAN).is_err());
        assert!(check_longitude("lon", -180.0).is_ok());
        assert!(check_longitude("lon", 181.0).is_err());
    }

    #[test]
    fn test_population_std() {
        // values 1, 2, 3: mean 2, mean of squares 14/3
        let std = population_std(Some(2.0), Some(14.0 / 3.0), 3).unwrap();
        assert!((std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert_eq!(population_std(Some(5.0), Some(25.0), 4), Some(0.0));
        assert_eq!(population_std(Some(5.0), Some(24.999_999_999_999_996), 4), Some(0.0));
        assert_eq!(population_std(None, None, 0), None);
        assert_eq!(population_std(Some(1.0), None, 1), None);
    }
}
