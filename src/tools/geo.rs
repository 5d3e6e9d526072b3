//! Great-circle distance and coordinate search boxes.

use crate::models::QueryParam;

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude, for sizing search boxes.
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Euclidean distance in degrees, taking the longitude gap the short way round.
pub fn degree_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lon = (lon2 - lon1).abs() % 360.0;
    let d_lon = d_lon.min(360.0 - d_lon);
    ((lat2 - lat1).powi(2) + d_lon.powi(2)).sqrt()
}

/// Half-width in degrees of the pre-filter box for a search radius.
pub fn search_half_width(radius_km: f64) -> f64 {
    (radius_km / KM_PER_DEGREE).clamp(0.1, 20.0)
}

/// A latitude band plus one or two longitude ranges.
///
/// Boxes that cross the antimeridian are split so each range stays inside
/// `[-180, 180]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_ranges: Vec<(f64, f64)>,
}

impl BoundingBox {
    pub fn around(lat: f64, lon: f64, half_width: f64) -> Self {
        let lat_min = (lat - half_width).max(-90.0);
        let lat_max = (lat + half_width).min(90.0);
        let west = lon - half_width;
        let east = lon + half_width;

        let lon_ranges = if half_width >= 180.0 {
            vec![(-180.0, 180.0)]
        } else if west < -180.0 {
            vec![(west + 360.0, 180.0), (-180.0, east)]
        } else if east > 180.0 {
            vec![(west, 180.0), (-180.0, east - 360.0)]
        } else {
            vec![(west, east)]
        };

        Self {
            lat_min,
            lat_max,
            lon_ranges,
        }
    }

    /// SQL predicate over `latitude`/`longitude` with placeholders starting
    /// at `$first`, and the values to bind in order.
    pub fn predicate(&self, first: usize) -> (String, Vec<QueryParam>) {
        let mut params = vec![QueryParam::Float(self.lat_min), QueryParam::Float(self.lat_max)];
        let mut next = first + 2;
        let lon_clauses: Vec<String> = self
            .lon_ranges
            .iter()
            .map(|&(lo, hi)| {
                params.push(QueryParam::Float(lo));
                params.push(QueryParam::Float(hi));
                let clause = format!("longitude BETWEEN ${} AND ${}", next, next + 1);
                next += 2;
                clause
            })
            .collect();

        let sql = format!(
            "latitude BETWEEN ${} AND ${} AND ({})",
            first,
            first + 1,
            lon_clauses.join(" OR ")
        );
        (sql, params)
    }
}

/// SQL expression ranking rows by approximate squared distance from a point,
/// with placeholders starting at `$first`, and the values to bind in order.
///
/// Longitude gaps wrap the short way round and shrink by `cos²(lat)`, so the
/// order matches great-circle order closely enough to pick candidates.
pub fn approx_distance_order(lat: f64, lon: f64, first: usize) -> (String, Vec<QueryParam>) {
    let lat_gap = format!("(CAST(latitude AS DOUBLE PRECISION) - ${first})");
    let lon_gap = format!("ABS(CAST(longitude AS DOUBLE PRECISION) - ${})", first + 1);
    let lon_wrapped = format!("(CASE WHEN {lon_gap} > 180 THEN 360 - {lon_gap} ELSE {lon_gap} END)");
    let sql = format!(
        "{lat_gap} * {lat_gap} + ${} * {lon_wrapped} * {lon_wrapped}",
        first + 2
    );
    let scale = lat.to_radians().cos().powi(2);
    (
        sql,
        vec![
            QueryParam::Float(lat),
            QueryParam::Float(lon),
            QueryParam::Float(scale),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distances() {
        assert_eq!(haversine_km(10.0, 20.0, 10.0, 20.0), 0.0);
        // 0.1 degree diagonal at the equator
        let d = haversine_km(0.0, 0.0, 0.1, 0.1);
        assert!((d - 15.72).abs() < 0.01, "got {d}");
        // One degree of longitude at the equator
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_haversine_across_antimeridian() {
        let d = haversine_km(0.0, 179.9, 0.0, -179.9);
        assert!((d - 22.24).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_haversine_symmetric_and_non_negative() {
        let points = [
            (0.0, 0.0),
            (0.1, 0.1),
            (5.0, 5.0),
            (-33.9, 18.4),
            (61.2, -149.9),
            (0.0, 179.9),
            (0.0, -179.9),
            (-89.9, 45.0),
        ];
        for &(lat1, lon1) in &points {
            for &(lat2, lon2) in &points {
                let there = haversine_km(lat1, lon1, lat2, lon2);
                let back = haversine_km(lat2, lon2, lat1, lon1);
                assert!(there >= 0.0, "negative distance {there}");
                assert!((there - back).abs() < 1e-9, "{there} vs {back}");
            }
        }
    }

    #[test]
    fn test_degree_distance() {
        assert!((degree_distance(0.0, 0.0, 0.3, 0.4) - 0.5).abs() < 1e-12);
        assert!((degree_distance(0.0, 179.5, 0.0, -179.5) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_search_half_width_bounds() {
        assert_eq!(search_half_width(1.0), 0.1);
        assert!((search_half_width(222.0) - 2.0).abs() < 1e-12);
        assert_eq!(search_half_width(50_000.0), 20.0);
    }

    #[test]
    fn test_box_without_wrap() {
        let bbox = BoundingBox::around(10.0, 20.0, 2.0);
        assert_eq!(bbox.lat_min, 8.0);
        assert_eq!(bbox.lat_max, 12.0);
        assert_eq!(bbox.lon_ranges, vec![(18.0, 22.0)]);
    }

    #[test]
    fn test_box_splits_at_antimeridian() {
        let bbox = BoundingBox::around(0.0, 179.0, 2.0);
        assert_eq!(bbox.lon_ranges, vec![(177.0, 180.0), (-180.0, -179.0)]);

        let bbox = BoundingBox::around(0.0, -179.5, 1.0);
        assert_eq!(bbox.lon_ranges, vec![(179.5, 180.0), (-180.0, -178.5)]);
    }

    #[test]
    fn test_box_clamps_latitude() {
        let bbox = BoundingBox::around(89.5, 0.0, 2.0);
        assert_eq!(bbox.lat_max, 90.0);
        assert_eq!(bbox.lat_min, 87.5);
    }

    #[test]
    fn test_predicate_placeholders() {
        let (sql, params) = BoundingBox::around(0.0, 0.0, 1.0).predicate(1);
        assert_eq!(sql, "latitude BETWEEN $1 AND $2 AND (longitude BETWEEN $3 AND $4)");
        assert_eq!(params.len(), 4);

        let (sql, params) = BoundingBox::around(0.0, 179.5, 1.0).predicate(2);
        assert_eq!(
            sql,
            "latitude BETWEEN $2 AND $3 AND (longitude BETWEEN $4 AND $5 OR longitude BETWEEN $6 AND $7)"
        );
        assert_eq!(params.len(), 6);
        assert_eq!(params[4], QueryParam::Float(-180.0));
    }

    #[test]
    fn test_approx_distance_order_placeholders() {
        let (sql, params) = approx_distance_order(60.0, 10.0, 5);
        assert!(sql.contains("$5"));
        assert!(sql.contains("$6"));
        assert!(sql.contains("$7"));
        assert!(!sql.contains("$8"));
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], QueryParam::Float(60.0));
        assert_eq!(params[1], QueryParam::Float(10.0));
        match params[2] {
            QueryParam::Float(scale) => assert!((scale - 0.25).abs() < 1e-12),
            ref other => panic!("unexpected scale {other:?}"),
        }
    }
}
