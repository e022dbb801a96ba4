//! # Algorithm Toolbox
//!
//! Direct access to the individual algorithms, for callers that want to run
//! one step on their own data without the engine.
//!
//! ## Core Algorithms
//!
//! - **Classification**: first-match point-in-polygon against reference zones
//! - **Clustering**: seeded k-means++ and zoom-adaptive centroid tiers
//! - **Recommendation**: severity-then-distance ranking, similar trails
//! - **Trail Difficulty**: energy miles and Shenandoah difficulty
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance in meters or miles
//! - **Polyline Length**: Total distance along a path
//! - **Bounds Computation**: Bounding box and center of a point set
//!
//! # Example
//!
//! ```rust
//! use outdoor_atlas::algorithms::{haversine_miles, kmeans, GeoPoint, KMeansParams};
//!
//! let denver = GeoPoint::new(39.7392, -104.9903);
//! let boulder = GeoPoint::new(40.0150, -105.2705);
//! assert!((haversine_miles(&denver, &boulder) - 24.0).abs() < 1.0);
//!
//! let result = kmeans(&[[0.0, 0.0], [0.0, 0.1], [5.0, 5.0]], 2, &KMeansParams::default());
//! assert_eq!(result.centroids.len(), 2);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{
    Bounds, Category, ClassificationResult, GeoPoint, PointFeature, PointKind, PolygonFeature,
};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    compute_bounds, compute_center, haversine_distance, haversine_miles, meters_to_feet,
    polyline_length, round_hundredths,
};

// =============================================================================
// Classification
// =============================================================================

pub use crate::classifier::{classify, classify_points, Classifier, PolygonIndex};

#[cfg(feature = "parallel")]
pub use crate::classifier::classify_points_parallel;

// =============================================================================
// Clustering
// =============================================================================

pub use crate::clustering::{
    build_cluster_layers, select_layer_for_zoom, ClusterConfig, ClusterLayers,
    LayerSelection,
};
pub use crate::kmeans::{kmeans, KMeansParams, KMeansResult};

// =============================================================================
// Recommendation and Trails
// =============================================================================

pub use crate::recommend::{recommend, recommend_similar_trails, RecommendOptions};
pub use crate::trails::{group_trails_by_place, length_color, TrailFeature};

// =============================================================================
// Alerts
// =============================================================================

pub use crate::alerts::{alert_level_for, build_alert_zones, parse_alert_description};
