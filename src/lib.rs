//! # Outdoor Atlas
//!
//! Air-quality and alert aware clustering and recommendations for outdoor
//! recreation sites (trailheads, campgrounds, fishing access).
//!
//! This library provides:
//! - First-match point-in-polygon classification against AQI and alert zones
//! - Zoom-adaptive k-means clustering of point features
//! - Distance and severity ranked recommendations, including similar trails
//!
//! Rendering, DOM and UI wiring are left to the caller: the outputs are plain
//! serializable records.
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel classification and clustering with rayon
//! - **`http`** - Enable HTTP sources for feature collections
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use outdoor_atlas::{classify, GeoPoint, PolygonFeature, Category, AqiLevel};
//! use geo::{polygon, MultiPolygon};
//!
//! let zone = PolygonFeature::new(
//!     "zone-1",
//!     MultiPolygon::new(vec![polygon![
//!         (x: -106.0, y: 38.5),
//!         (x: -105.0, y: 38.5),
//!         (x: -105.0, y: 39.5),
//!         (x: -106.0, y: 39.5),
//!         (x: -106.0, y: 38.5),
//!     ]]),
//!     Category::Aqi(AqiLevel::Good),
//! );
//!
//! let result = classify(&GeoPoint::new(39.0, -105.78), &[zone]);
//! assert_eq!(result.category, Category::Aqi(AqiLevel::Good));
//! ```

use geo::{BoundingRect, Intersects, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{AtlasError, OptionExt, Result};

// Categories, severity ranks and styles
pub mod category;
pub use category::{AlertLevel, AqiLevel, AqiStyle, Category};

// Geographic utilities (distance, bounds, unit conversion)
pub mod geo_utils;

// GeoJSON ingest and validation
pub mod ingest;

// NWS alert parsing and county alert zones
pub mod alerts;
pub use alerts::{
    alert_level_for, build_alert_zones, parse_alert_description, parse_alerts, AlertDescription,
    WeatherAlert,
};

// Point-in-polygon classification
pub mod classifier;
pub use classifier::{classify, classify_points, Classifier, PolygonIndex};
#[cfg(feature = "parallel")]
pub use classifier::classify_points_parallel;

// k-means++ clustering
pub mod kmeans;

// Zoom-adaptive cluster layers
pub mod clustering;
pub use clustering::{
    build_cluster_layers, classify_and_cluster, select_layer_for_zoom, CategoryFlags,
    ClusterCentroid, ClusterConfig, ClusterLayers, LayerSelection,
};

// Trails and difficulty metrics
pub mod trails;
pub use trails::{group_trails_by_place, TrailFeature};

// Recommendations
pub mod recommend;
pub use recommend::{
    recommend, recommend_similar_trails, RecommendOptions, Recommendation, TrailRecommendation,
};

// View state and visible layer selection
pub mod view;
pub use view::{compute_visible_layer, Baseline, LayerId, ViewState};

// LRU cache for classified layers
pub mod lru_cache;

// Stateful engine tying data, classification and clustering together
pub mod engine;
pub use engine::{AtlasEngine, EngineConfig, EngineStats, VisibleMarkers};

// Data sources and concurrent loading
pub mod sources;
pub use sources::{load_datasets, Datasets, FeatureSource, FileSource, SourceSet, StaticSource};

// HTTP sources
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::HttpSource;

// Algorithm toolbox
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees.
///
/// GeoJSON positions are `[lon, lat]`; use [`GeoPoint::from_lon_lat`] when
/// reading them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a point from a GeoJSON-ordered `(lon, lat)` pair.
    pub fn from_lon_lat(longitude: f64, latitude: f64) -> Self {
        Self::new(latitude, longitude)
    }

    /// GeoJSON-ordered `[lon, lat]`.
    pub fn to_lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Planar geo point (x = longitude, y = latitude).
    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// Bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// Source type of a point feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Trailhead,
    Camping,
    Fishing,
    Other,
}

const FISHING_FACILITIES: [&str; 5] = [
    "Boat Ramp",
    "Boating",
    "Fishing",
    "Fishing - ADA Accessible",
    "Marina",
];

const CAMPING_FACILITIES: [&str; 5] = [
    "Cabin",
    "Campground",
    "Campsite",
    "Group Campground",
    "RV Campground, Yurt",
];

impl PointKind {
    /// Map a state-parks facility type (`d_FAC_TYPE`) to a point kind.
    pub fn from_facility_type(facility_type: &str) -> Self {
        if FISHING_FACILITIES.contains(&facility_type) {
            PointKind::Fishing
        } else if CAMPING_FACILITIES.contains(&facility_type) {
            PointKind::Camping
        } else {
            PointKind::Other
        }
    }
}

/// Result of classifying a coordinate against reference polygons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub color: String,
    pub category: Category,
}

impl ClassificationResult {
    pub fn new(color: impl Into<String>, category: Category) -> Self {
        Self {
            color: color.into(),
            category,
        }
    }

    /// `{color: "black", category: "N/A"}`, returned when no polygon matches.
    pub fn fallback() -> Self {
        Self::new(category::FALLBACK_COLOR, Category::Unavailable)
    }

    pub fn is_fallback(&self) -> bool {
        self.category == Category::Unavailable
    }
}

/// A point of interest (trailhead, campsite, fishing access, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointFeature {
    pub id: String,
    pub name: String,
    pub kind: PointKind,
    pub coordinates: GeoPoint,
    /// Remaining GeoJSON properties, kept for the rendering surface
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_color: Option<String>,
}

impl PointFeature {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: PointKind,
        coordinates: GeoPoint,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            coordinates,
            properties: serde_json::Map::new(),
            category: None,
            style_color: None,
        }
    }

    /// A copy of this feature tagged with `result`. The original is left untouched.
    pub fn with_classification(&self, result: &ClassificationResult) -> Self {
        Self {
            category: Some(result.category),
            style_color: Some(result.color.clone()),
            ..self.clone()
        }
    }

    /// The attached classification, if this feature has been classified.
    pub fn classification(&self) -> Option<ClassificationResult> {
        let category = self.category?;
        let color = self
            .style_color
            .clone()
            .unwrap_or_else(|| category.color().to_string());
        Some(ClassificationResult { color, category })
    }
}

/// A reference zone (AQI forecast polygon, county alert area).
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub id: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    pub category: Category,
    pub style_color: String,
}

impl PolygonFeature {
    /// Create a zone styled with the category's default colour.
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>, category: Category) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            geometry,
            category,
            style_color: category.color().to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Boundary-inclusive point test.
    pub fn intersects_point(&self, point: &GeoPoint) -> bool {
        self.geometry.intersects(&point.to_geo())
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn classification(&self) -> ClassificationResult {
        ClassificationResult::new(self.style_color.clone(), self.category)
    }
}

// ============================================================================
// Tests
// ============================================================================
