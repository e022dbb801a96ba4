//! GeoJSON ingest and validation.
//!
//! Everything read from the outside world passes through here. Geometry is
//! validated once at load time so classification never has to fail:
//! coordinates must be finite and in range, polygon rings must be closed with
//! at least four positions. Features without geometry are skipped.

use geo::{LineString, MultiPolygon, Polygon};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Value};
use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use crate::error::{AtlasError, Result};
use crate::geo_utils::{polyline_length, METERS_PER_MILE};
use crate::trails::TrailFeature;
use crate::{AlertLevel, AqiLevel, Category, GeoPoint, PointFeature, PointKind, PolygonFeature};

/// Property holding the facility type in the state-parks dataset.
pub const FACILITY_TYPE_KEY: &str = "d_FAC_TYPE";

/// Property holding the AirNow KML style reference.
pub const STYLE_URL_KEY: &str = "styleUrl";

const FIPS_KEYS: [&str; 3] = ["US_FIPS", "FIPS", "GEOID"];
const NAME_KEYS: [&str; 3] = ["name", "NAME", "FAC_NAME"];

/// Parse GeoJSON text into a feature collection.
///
/// A bare `Feature` is wrapped in a one-element collection; a bare geometry is
/// rejected.
pub fn parse_feature_collection(json: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = json.parse()?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(AtlasError::Parse {
            message: "expected a FeatureCollection, found a bare geometry".to_string(),
        }),
    }
}

// ============================================================================
// Property helpers
// ============================================================================

fn prop_str(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn prop_f64(feature: &Feature, key: &str) -> Option<f64> {
    match feature.property(key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_prop(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| prop_str(feature, key))
}

/// Stable id: the GeoJSON `id`, then `id`/`feature_id` properties, then the
/// feature's position in the collection.
fn feature_id(feature: &Feature, index: usize) -> String {
    match &feature.id {
        Some(Id::String(s)) => s.clone(),
        Some(Id::Number(n)) => n.to_string(),
        None => first_prop(feature, &["id", "feature_id", "OBJECTID"])
            .unwrap_or_else(|| format!("feature-{}", index)),
    }
}

// ============================================================================
// Geometry conversion and validation
// ============================================================================

fn to_point(position: &[f64], feature_id: &str) -> Result<GeoPoint> {
    if position.len() < 2 {
        return Err(AtlasError::InvalidCoordinates {
            feature_id: feature_id.to_string(),
            message: format!("position has {} values, expected at least 2", position.len()),
        });
    }
    let point = GeoPoint::from_lon_lat(position[0], position[1]);
    if !point.is_valid() {
        return Err(AtlasError::InvalidCoordinates {
            feature_id: feature_id.to_string(),
            message: format!("({}, {}) is not a valid lon/lat", position[0], position[1]),
        });
    }
    Ok(point)
}

fn to_line(positions: &[Vec<f64>], feature_id: &str) -> Result<Vec<GeoPoint>> {
    positions.iter().map(|p| to_point(p, feature_id)).collect()
}

fn to_ring(positions: &[Vec<f64>], feature_id: &str) -> Result<LineString<f64>> {
    if positions.len() < 4 {
        return Err(AtlasError::InvalidGeometry {
            feature_id: feature_id.to_string(),
            message: format!("ring has {} positions, expected at least 4", positions.len()),
        });
    }
    let points = to_line(positions, feature_id)?;
    if points.first() != points.last() {
        return Err(AtlasError::InvalidGeometry {
            feature_id: feature_id.to_string(),
            message: "ring is not closed".to_string(),
        });
    }
    Ok(points.iter().map(|p| (p.longitude, p.latitude)).collect())
}

fn to_polygon(rings: &[Vec<Vec<f64>>], feature_id: &str) -> Result<Polygon<f64>> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err(AtlasError::InvalidGeometry {
            feature_id: feature_id.to_string(),
            message: "polygon has no rings".to_string(),
        });
    };
    let exterior = to_ring(exterior, feature_id)?;
    let interiors = interiors
        .iter()
        .map(|ring| to_ring(ring, feature_id))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Validate a Polygon or MultiPolygon geometry and convert it.
pub fn multipolygon_from_value(value: &Value, feature_id: &str) -> Result<MultiPolygon<f64>> {
    match value {
        Value::Polygon(rings) => Ok(MultiPolygon::new(vec![to_polygon(rings, feature_id)?])),
        Value::MultiPolygon(polygons) => {
            let polygons = polygons
                .iter()
                .map(|rings| to_polygon(rings, feature_id))
                .collect::<Result<Vec<_>>>()?;
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(AtlasError::InvalidGeometry {
            feature_id: feature_id.to_string(),
            message: format!("expected Polygon or MultiPolygon, found {}", geometry_type(other)),
        }),
    }
}

/// Geometry of a feature, or `None` (logged) when it has none.
fn geometry_of<'a>(feature: &'a Feature, id: &str) -> Option<&'a Value> {
    match &feature.geometry {
        Some(geometry) => Some(&geometry.value),
        None => {
            debug!("[Ingest] Skipping feature '{}' without geometry", id);
            None
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

fn point_feature(feature: &Feature, index: usize, kind: PointKind) -> Result<Option<PointFeature>> {
    let id = feature_id(feature, index);
    let Some(value) = geometry_of(feature, &id) else {
        return Ok(None);
    };
    let coordinates = match value {
        Value::Point(position) => to_point(position, &id)?,
        other => {
            return Err(AtlasError::InvalidGeometry {
                feature_id: id,
                message: format!("expected Point, found {}", geometry_type(other)),
            })
        }
    };

    let name = first_prop(feature, &NAME_KEYS).unwrap_or_default();
    let mut point = PointFeature::new(id, name, kind, coordinates);
    if let Some(properties) = &feature.properties {
        point.properties = properties.clone();
    }
    Ok(Some(point))
}

/// Read point features (trailheads and similar) of a single kind.
pub fn points_from_collection(
    fc: &FeatureCollection,
    kind: PointKind,
) -> Result<Vec<PointFeature>> {
    let mut points = Vec::with_capacity(fc.features.len());
    for (index, feature) in fc.features.iter().enumerate() {
        if let Some(point) = point_feature(feature, index, kind)? {
            points.push(point);
        }
    }
    info!("[Ingest] Loaded {} {:?} points", points.len(), kind);
    Ok(points)
}

/// Read state-parks facilities; the kind comes from the facility type property.
pub fn facilities_from_collection(fc: &FeatureCollection) -> Result<Vec<PointFeature>> {
    let mut points = Vec::with_capacity(fc.features.len());
    for (index, feature) in fc.features.iter().enumerate() {
        let kind = prop_str(feature, FACILITY_TYPE_KEY)
            .map(|t| PointKind::from_facility_type(&t))
            .unwrap_or(PointKind::Other);
        if let Some(point) = point_feature(feature, index, kind)? {
            points.push(point);
        }
    }
    info!("[Ingest] Loaded {} facilities", points.len());
    Ok(points)
}

/// Read AirNow forecast polygons. The level comes from `styleUrl`; an unknown
/// or missing style is read as `Unavailable`.
pub fn aqi_zones_from_collection(fc: &FeatureCollection) -> Result<Vec<PolygonFeature>> {
    let mut zones = Vec::with_capacity(fc.features.len());
    for (index, feature) in fc.features.iter().enumerate() {
        let id = feature_id(feature, index);
        let Some(value) = geometry_of(feature, &id) else {
            continue;
        };
        let geometry = multipolygon_from_value(value, &id)?;

        let style_url = prop_str(feature, STYLE_URL_KEY);
        let level = match style_url.as_deref().and_then(AqiLevel::from_style_url) {
            Some(level) => level,
            None => {
                warn!(
                    "[Ingest] Zone '{}' has unknown style {:?}, treating as unavailable",
                    id, style_url
                );
                AqiLevel::Unavailable
            }
        };

        let name = first_prop(feature, &NAME_KEYS).unwrap_or_default();
        zones.push(PolygonFeature::new(id, geometry, Category::Aqi(level)).with_name(name));
    }
    info!("[Ingest] Loaded {} AQI zones", zones.len());
    Ok(zones)
}

/// Read county boundaries. The county name is read from `name_key`, the id
/// is the FIPS code when one of the usual FIPS properties is present.
pub fn counties_from_collection(
    fc: &FeatureCollection,
    name_key: &str,
) -> Result<Vec<PolygonFeature>> {
    let mut counties = Vec::with_capacity(fc.features.len());
    for (index, feature) in fc.features.iter().enumerate() {
        let id = first_prop(feature, &FIPS_KEYS).unwrap_or_else(|| feature_id(feature, index));
        let Some(value) = geometry_of(feature, &id) else {
            continue;
        };
        let geometry = multipolygon_from_value(value, &id)?;
        let name = prop_str(feature, name_key).unwrap_or_default();
        counties.push(
            PolygonFeature::new(id, geometry, Category::Alert(AlertLevel::None)).with_name(name),
        );
    }
    info!("[Ingest] Loaded {} counties", counties.len());
    Ok(counties)
}

/// Read trail segments (LineString or MultiLineString).
///
/// Length comes from `length_mi_` when present, otherwise it is measured
/// along the geometry. Elevations come from `min_elevat` / `max_elevat` in
/// meters and default to zero.
pub fn trails_from_collection(fc: &FeatureCollection) -> Result<Vec<TrailFeature>> {
    let mut trails = Vec::with_capacity(fc.features.len());
    for (index, feature) in fc.features.iter().enumerate() {
        let id = feature_id(feature, index);
        let Some(value) = geometry_of(feature, &id) else {
            continue;
        };
        let lines = match value {
            Value::LineString(positions) => vec![to_line(positions, &id)?],
            Value::MultiLineString(lines) => lines
                .iter()
                .map(|line| to_line(line, &id))
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(AtlasError::InvalidGeometry {
                    feature_id: id,
                    message: format!(
                        "expected LineString or MultiLineString, found {}",
                        geometry_type(other)
                    ),
                })
            }
        };

        let length_mi = prop_f64(feature, "length_mi_").unwrap_or_else(|| {
            lines.iter().map(|l| polyline_length(l)).sum::<f64>() / METERS_PER_MILE
        });
        let name = prop_str(feature, "name").unwrap_or_default();
        let mut trail = TrailFeature::new(
            id,
            name,
            length_mi,
            prop_f64(feature, "min_elevat").unwrap_or(0.0),
            prop_f64(feature, "max_elevat").unwrap_or(0.0),
            lines,
        );
        if let Some(place_id) = prop_str(feature, "place_id") {
            trail = trail.with_place_id(place_id);
        }
        trails.push(trail);
    }
    info!("[Ingest] Loaded {} trail segments", trails.len());
    Ok(trails)
}
