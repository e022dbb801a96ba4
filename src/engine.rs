//! # Atlas Engine
//!
//! Stateful engine holding point sets, reference zones and derived layers.
//!
//! ## Architecture
//!
//! The engine manages:
//! - Point sets (trailheads, facilities) keyed by name
//! - Trails, grouped by place
//! - Reference zones per baseline (today's AQI, tomorrow's AQI, county alerts)
//! - Unclassified cluster positions over the combined point set
//! - An LRU cache of classified layers per baseline
//!
//! Replacing a point set marks positions dirty and the next query re-runs
//! k-means. Replacing reference zones only drops that baseline's classified
//! layer; positions are reused and re-tagged. Layers are always recomputed
//! from scratch, never patched.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::alerts::{build_alert_zones, parse_alerts};
use crate::classifier::PolygonIndex;
use crate::clustering::{
    build_cluster_layers, ClusterCentroid, ClusterConfig, ClusterLayers, LayerSelection,
};
use crate::error::{AtlasError, OptionExt, Result};
use crate::ingest::{
    aqi_zones_from_collection, counties_from_collection, facilities_from_collection,
    parse_feature_collection, points_from_collection, trails_from_collection,
};
use crate::lru_cache::LruCache;
use crate::recommend::{
    recommend, recommend_similar_trails, RecommendOptions, Recommendation, TrailRecommendation,
};
use crate::sources::Datasets;
use crate::trails::{group_trails_by_place, TrailFeature};
use crate::view::{compute_visible_layer, Baseline, LayerId, ViewState};
use crate::{PointFeature, PointKind, PolygonFeature};

#[cfg(not(feature = "parallel"))]
use crate::classifier::classify_points;

#[cfg(feature = "parallel")]
use crate::classifier::classify_points_parallel;

/// Point set name used for trailheads loaded from [`Datasets`].
pub const TRAILHEADS: &str = "trailheads";

/// Point set name used for state-parks facilities loaded from [`Datasets`].
pub const FACILITIES: &str = "facilities";

// ============================================================================
// Configuration
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Cluster tiers and zoom thresholds.
    pub clustering: ClusterConfig,

    /// Number of classified baselines kept in memory.
    /// Default: 3 (today, tomorrow, alerts)
    pub cache_capacity: usize,

    /// Default recommendation radius.
    /// Default: 50.0 miles
    pub max_distance_mi: f64,

    /// Default number of recommendations.
    /// Default: 10
    pub recommendation_limit: usize,

    /// Property holding the county name in the boundary dataset.
    /// Default: "COUNTY"
    pub county_name_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clustering: ClusterConfig::default(),
            cache_capacity: 3,
            max_distance_mi: 50.0,
            recommendation_limit: 10,
            county_name_key: "COUNTY".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.clustering.validate()?;
        if self.cache_capacity == 0 {
            return Err(AtlasError::Config {
                message: "cache_capacity must be at least 1".to_string(),
            });
        }
        if !(self.max_distance_mi.is_finite() && self.max_distance_mi > 0.0) {
            return Err(AtlasError::Config {
                message: format!("max_distance_mi must be positive, got {}", self.max_distance_mi),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Output Types
// ============================================================================

/// What the map should draw for a view state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "features", rename_all = "camelCase")]
pub enum VisibleMarkers {
    Clusters(Vec<ClusterCentroid>),
    Points(Vec<PointFeature>),
}

impl VisibleMarkers {
    pub fn len(&self) -> usize {
        match self {
            VisibleMarkers::Clusters(c) => c.len(),
            VisibleMarkers::Points(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A baseline's classified data: re-tagged cluster tiers and raw points.
#[derive(Debug, Clone)]
struct ClassifiedLayers {
    clusters: ClusterLayers,
    points: Vec<PointFeature>,
}

/// Engine statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub point_count: u32,
    pub point_set_count: u32,
    pub trail_count: u32,
    pub aqi_today_zone_count: u32,
    pub aqi_tomorrow_zone_count: u32,
    pub alert_zone_count: u32,
    pub cluster_tier_count: u32,
    pub cached_layer_count: u32,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub positions_dirty: bool,
}

// ============================================================================
// Atlas Engine
// ============================================================================

/// The main stateful engine.
pub struct AtlasEngine {
    // Core state
    point_sets: BTreeMap<String, Vec<PointFeature>>,
    trails: Vec<TrailFeature>,
    aqi_today: PolygonIndex,
    aqi_tomorrow: PolygonIndex,
    alert_zones: PolygonIndex,

    // Derived state
    combined: Vec<PointFeature>,
    positions: ClusterLayers,
    layer_cache: LruCache<Baseline, ClassifiedLayers>,

    // Dirty tracking
    positions_dirty: bool,

    config: EngineConfig,
}

impl AtlasEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            point_sets: BTreeMap::new(),
            trails: Vec::new(),
            aqi_today: PolygonIndex::new(Vec::new()),
            aqi_tomorrow: PolygonIndex::new(Vec::new()),
            alert_zones: PolygonIndex::new(Vec::new()),
            combined: Vec::new(),
            positions: ClusterLayers::default(),
            layer_cache: LruCache::new(config.cache_capacity),
            positions_dirty: false,
            config,
        }
    }

    /// Create an engine and load every dataset.
    pub fn from_datasets(datasets: &Datasets, config: EngineConfig) -> Result<Self> {
        let mut engine = Self::with_config(config)?;
        engine.load(datasets)?;
        Ok(engine)
    }

    /// Parse and install every dataset. Nothing is replaced if any dataset
    /// fails to parse.
    pub fn load(&mut self, datasets: &Datasets) -> Result<()> {
        let trailheads = points_from_collection(
            &parse_feature_collection(&datasets.trailheads)?,
            PointKind::Trailhead,
        )?;
        let facilities =
            facilities_from_collection(&parse_feature_collection(&datasets.facilities)?)?;
        let today = aqi_zones_from_collection(&parse_feature_collection(&datasets.aqi_today)?)?;
        let tomorrow =
            aqi_zones_from_collection(&parse_feature_collection(&datasets.aqi_tomorrow)?)?;
        let counties = counties_from_collection(
            &parse_feature_collection(&datasets.counties)?,
            &self.config.county_name_key,
        )?;
        let alerts = parse_alerts(&datasets.alerts)?;
        let trails = match &datasets.trails {
            Some(json) => trails_from_collection(&parse_feature_collection(json)?)?,
            None => Vec::new(),
        };

        self.set_point_set(TRAILHEADS, trailheads);
        self.set_point_set(FACILITIES, facilities);
        self.set_aqi_zones(Baseline::Today, today)?;
        self.set_aqi_zones(Baseline::Tomorrow, tomorrow)?;
        self.set_alert_zones(build_alert_zones(&counties, &alerts));
        self.set_trails(trails);

        info!(
            "[AtlasEngine] Loaded {} points, {} trails, {} counties",
            self.combined_len(),
            self.trails.len(),
            self.alert_zones.len()
        );
        Ok(())
    }

    // ========================================================================
    // Data Management
    // ========================================================================

    /// Replace (or add) a named point set. Positions are recomputed on the next query.
    pub fn set_point_set(&mut self, name: &str, points: Vec<PointFeature>) {
        debug!("[AtlasEngine] Point set '{}' replaced ({} points)", name, points.len());
        self.point_sets.insert(name.to_string(), points);
        self.positions_dirty = true;
        self.layer_cache.clear();
    }

    /// Drop a point set. Returns false if no set had that name.
    pub fn remove_point_set(&mut self, name: &str) -> bool {
        let removed = self.point_sets.remove(name).is_some();
        if removed {
            self.positions_dirty = true;
            self.layer_cache.clear();
        }
        removed
    }

    /// Replace today's or tomorrow's AQI zones. Only that baseline's layer is dropped.
    pub fn set_aqi_zones(&mut self, baseline: Baseline, zones: Vec<PolygonFeature>) -> Result<()> {
        let index = PolygonIndex::new(zones);
        match baseline {
            Baseline::Today => self.aqi_today = index,
            Baseline::Tomorrow => self.aqi_tomorrow = index,
            Baseline::Alerts => {
                return Err(AtlasError::Config {
                    message: "alert zones are set with set_alert_zones".to_string(),
                })
            }
        }
        self.layer_cache.invalidate(&baseline);
        Ok(())
    }

    /// Replace the county alert zones.
    pub fn set_alert_zones(&mut self, zones: Vec<PolygonFeature>) {
        self.alert_zones = PolygonIndex::new(zones);
        self.layer_cache.invalidate(&Baseline::Alerts);
    }

    /// Replace trails; segments sharing a place are merged.
    pub fn set_trails(&mut self, trails: Vec<TrailFeature>) {
        self.trails = group_trails_by_place(&trails);
    }

    /// Clear all data and reset state.
    pub fn clear(&mut self) {
        let config = self.config.clone();
        *self = Self::build(config);
    }

    pub fn point(&self, id: &str) -> Option<&PointFeature> {
        self.point_sets.values().flatten().find(|p| p.id == id)
    }

    pub fn trail(&self, id: &str) -> Option<&TrailFeature> {
        self.trails.iter().find(|t| t.id == id)
    }

    pub fn trails(&self) -> &[TrailFeature] {
        &self.trails
    }

    /// Reference zones used for a baseline.
    pub fn zones(&self, baseline: Baseline) -> &PolygonIndex {
        match baseline {
            Baseline::Today => &self.aqi_today,
            Baseline::Tomorrow => &self.aqi_tomorrow,
            Baseline::Alerts => &self.alert_zones,
        }
    }

    fn combined_len(&self) -> usize {
        self.point_sets.values().map(Vec::len).sum()
    }

    // ========================================================================
    // Derived Layers
    // ========================================================================

    /// Re-run clustering over the combined point set if any point set changed.
    fn ensure_positions(&mut self) {
        if !self.positions_dirty {
            return;
        }

        self.combined = self.point_sets.values().flatten().cloned().collect();
        self.positions = build_cluster_layers(
            &self.combined,
            &self.config.clustering.k_values,
            &self.config.clustering.kmeans_params(),
        );
        self.positions_dirty = false;
    }

    /// Classified layers for a baseline, from cache when possible.
    fn classified(&mut self, baseline: Baseline) -> &ClassifiedLayers {
        self.ensure_positions();

        let index = match baseline {
            Baseline::Today => &self.aqi_today,
            Baseline::Tomorrow => &self.aqi_tomorrow,
            Baseline::Alerts => &self.alert_zones,
        };
        let positions = &self.positions;
        let combined = &self.combined;

        self.layer_cache.get_or_insert_with(baseline, || {
            debug!("[AtlasEngine] Classifying {:?} layer", baseline);

            #[cfg(feature = "parallel")]
            let points = classify_points_parallel(combined, index);
            #[cfg(not(feature = "parallel"))]
            let points = classify_points(combined, index);

            ClassifiedLayers {
                clusters: positions.reclassify(index),
                points,
            }
        })
    }

    /// The layer that should be visible for `state`.
    pub fn visible_layer(&self, state: &ViewState) -> LayerId {
        compute_visible_layer(state, &self.config.clustering)
    }

    /// Markers to draw for `state`: classified centroids of the selected tier
    /// (those with at least one member of an active kind) or classified raw
    /// points of the active kinds.
    pub fn visible_markers(&mut self, state: &ViewState) -> VisibleMarkers {
        let layer = self.visible_layer(state);
        let classified = self.classified(layer.baseline);

        match layer.selection {
            LayerSelection::Clustered(k) => VisibleMarkers::Clusters(
                classified
                    .clusters
                    .get(k)
                    .unwrap_or_default()
                    .iter()
                    .filter(|c| layer.kinds.iter().any(|&kind| c.category_flags.contains(kind)))
                    .cloned()
                    .collect(),
            ),
            LayerSelection::Raw => VisibleMarkers::Points(
                classified
                    .points
                    .iter()
                    .filter(|p| layer.kinds.contains(&p.kind))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// Classified points for a baseline.
    pub fn classified_points(&mut self, baseline: Baseline) -> Vec<PointFeature> {
        self.classified(baseline).points.clone()
    }

    /// Classified cluster tiers for a baseline.
    pub fn cluster_layers(&mut self, baseline: Baseline) -> ClusterLayers {
        self.classified(baseline).clusters.clone()
    }

    // ========================================================================
    // Recommendations
    // ========================================================================

    /// Default options for an origin: the configured radius and limit, every
    /// category no worse than the origin's.
    pub fn default_options_for(&self, origin: &PointFeature) -> RecommendOptions {
        RecommendOptions::for_origin(
            origin.category,
            self.config.max_distance_mi,
            self.config.recommendation_limit,
        )
    }

    /// Recommend sites near the point `id`, ranked by alert level then distance.
    ///
    /// The origin and candidates are classified against the alert zones.
    /// With `options == None` the defaults from [`Self::default_options_for`]
    /// apply.
    pub fn recommend_for(
        &mut self,
        id: &str,
        options: Option<&RecommendOptions>,
    ) -> Result<Vec<Recommendation>> {
        let candidates = self.classified_points(Baseline::Alerts);
        let origin = candidates
            .iter()
            .find(|p| p.id == id)
            .ok_or_not_found(&format!("point '{}'", id))?;

        let defaults;
        let options = match options {
            Some(options) => options,
            None => {
                defaults = self.default_options_for(origin);
                &defaults
            }
        };

        Ok(recommend(origin, &candidates, options))
    }

    /// Recommend trails of similar difficulty near trail `id`, ranked by
    /// alert level then distance.
    pub fn recommend_trails_for(
        &self,
        id: &str,
        options: Option<&RecommendOptions>,
    ) -> Result<Vec<TrailRecommendation>> {
        let origin = self.trail(id).ok_or_not_found(&format!("trail '{}'", id))?;

        let defaults;
        let options = match options {
            Some(options) => options,
            None => {
                let category = origin
                    .start_point()
                    .map(|start| self.alert_zones.classify(&start).category);
                defaults = RecommendOptions::for_origin(
                    category,
                    self.config.max_distance_mi,
                    self.config.recommendation_limit,
                );
                &defaults
            }
        };

        Ok(recommend_similar_trails(origin, &self.trails, &self.alert_zones, options))
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Replace the configuration. Cluster positions are recomputed.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        self.layer_cache = LruCache::new(config.cache_capacity);
        self.config = config;
        self.positions_dirty = true;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> EngineStats {
        let (cache_hits, cache_misses) = self.layer_cache.hit_stats();
        EngineStats {
            point_count: self.combined_len() as u32,
            point_set_count: self.point_sets.len() as u32,
            trail_count: self.trails.len() as u32,
            aqi_today_zone_count: self.aqi_today.len() as u32,
            aqi_tomorrow_zone_count: self.aqi_tomorrow.len() as u32,
            alert_zone_count: self.alert_zones.len() as u32,
            cluster_tier_count: self.positions.tiers().count() as u32,
            cached_layer_count: self.layer_cache.len() as u32,
            cache_hits,
            cache_misses,
            positions_dirty: self.positions_dirty,
        }
    }
}

impl Default for AtlasEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertLevel, AqiLevel, Category, GeoPoint};
    use geo::{polygon, MultiPolygon};

    fn zone(id: &str, min_x: f64, max_x: f64, category: Category) -> PolygonFeature {
        PolygonFeature::new(
            id,
            MultiPolygon::new(vec![polygon![
                (x: min_x, y: 37.0),
                (x: max_x, y: 37.0),
                (x: max_x, y: 41.0),
                (x: min_x, y: 41.0),
                (x: min_x, y: 37.0),
            ]]),
            category,
        )
    }

    fn sample_points() -> Vec<PointFeature> {
        (0..30)
            .map(|i| {
                let kind = match i % 3 {
                    0 => PointKind::Trailhead,
                    1 => PointKind::Camping,
                    _ => PointKind::Fishing,
                };
                PointFeature::new(
                    format!("p{}", i),
                    format!("Site {}", i),
                    kind,
                    GeoPoint::new(39.0 + (i % 5) as f64 * 0.1, -107.0 + i as f64 * 0.1),
                )
            })
            .collect()
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            clustering: ClusterConfig {
                k_values: vec![3, 6, 12],
                ..ClusterConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn loaded_engine() -> AtlasEngine {
        let mut engine = AtlasEngine::with_config(small_config()).unwrap();
        engine.set_point_set(TRAILHEADS, sample_points());
        engine
            .set_aqi_zones(
                Baseline::Today,
                vec![
                    zone("west", -108.0, -105.5, Category::Aqi(AqiLevel::Good)),
                    zone("east", -105.5, -103.0, Category::Aqi(AqiLevel::Moderate)),
                ],
            )
            .unwrap();
        engine.set_alert_zones(vec![
            zone("mesa", -108.0, -105.0, Category::Alert(AlertLevel::None)),
            zone("denver", -105.0, -103.0, Category::Alert(AlertLevel::SmokeDust)),
        ]);
        engine
    }

    #[test]
    fn test_visible_clusters_follow_zoom() {
        let mut engine = loaded_engine();

        let coarse = engine.visible_markers(&ViewState::new(6.0, Baseline::Today));
        let VisibleMarkers::Clusters(centroids) = &coarse else {
            panic!("expected clusters");
        };
        assert!(centroids.len() <= 3);
        assert_eq!(centroids.iter().map(|c| c.member_count).sum::<usize>(), 30);
        assert!(centroids.iter().all(|c| c.category.is_some()));

        let raw = engine.visible_markers(&ViewState::new(14.0, Baseline::Today));
        assert!(matches!(raw, VisibleMarkers::Points(ref p) if p.len() == 30));
    }

    #[test]
    fn test_filters_apply_to_raw_points() {
        let mut engine = loaded_engine();
        let state = ViewState::new(15.0, Baseline::Alerts).with_filters([PointKind::Fishing]);
        let VisibleMarkers::Points(points) = engine.visible_markers(&state) else {
            panic!("expected points");
        };
        assert_eq!(points.len(), 10);
        assert!(points.iter().all(|p| p.kind == PointKind::Fishing));
        assert!(points.iter().all(|p| p.category.is_some()));
    }

    #[test]
    fn test_reference_change_keeps_positions() {
        let mut engine = loaded_engine();
        let before = engine.cluster_layers(Baseline::Today);
        assert!(!engine.stats().positions_dirty);

        engine
            .set_aqi_zones(
                Baseline::Today,
                vec![zone("all", -110.0, -100.0, Category::Aqi(AqiLevel::Hazardous))],
            )
            .unwrap();
        assert!(!engine.stats().positions_dirty);

        let after = engine.cluster_layers(Baseline::Today);
        for k in before.tiers() {
            let old: Vec<GeoPoint> = before.get(k).unwrap().iter().map(|c| c.coordinates).collect();
            let new: Vec<GeoPoint> = after.get(k).unwrap().iter().map(|c| c.coordinates).collect();
            assert_eq!(old, new);
        }
        assert!(after
            .get(3)
            .unwrap()
            .iter()
            .all(|c| c.category == Some(Category::Aqi(AqiLevel::Hazardous))));
    }

    #[test]
    fn test_point_change_marks_dirty() {
        let mut engine = loaded_engine();
        engine.classified_points(Baseline::Today);
        assert_eq!(engine.stats().cached_layer_count, 1);

        engine.set_point_set(FACILITIES, vec![]);
        let stats = engine.stats();
        assert!(stats.positions_dirty);
        assert_eq!(stats.cached_layer_count, 0);
        assert_eq!(stats.point_set_count, 2);
    }

    #[test]
    fn test_remove_point_set() {
        let mut engine = loaded_engine();
        engine.classified_points(Baseline::Today);

        assert!(engine.remove_point_set(TRAILHEADS));
        let stats = engine.stats();
        assert!(stats.positions_dirty);
        assert_eq!(stats.cached_layer_count, 0);
        assert_eq!(stats.point_set_count, 0);
        assert!(engine.point("p0").is_none());
        assert!(!engine.remove_point_set(TRAILHEADS));
    }

    #[test]
    fn test_cache_hits() {
        let mut engine = loaded_engine();
        engine.visible_markers(&ViewState::new(6.0, Baseline::Today));
        engine.visible_markers(&ViewState::new(9.0, Baseline::Today));
        engine.visible_markers(&ViewState::new(9.0, Baseline::Alerts));
        let stats = engine.stats();
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn test_recommend_for() {
        let mut engine = loaded_engine();
        let recs = engine.recommend_for("p0", None).unwrap();
        assert_eq!(recs[0].feature.id, "p0");
        assert_eq!(
            recs[0].feature.category,
            Some(Category::Alert(AlertLevel::None))
        );
        // Origin is in the clean county, so smoke-affected sites are excluded
        assert!(recs
            .iter()
            .all(|r| r.feature.category == Some(Category::Alert(AlertLevel::None))));
        assert!(recs.len() <= 11);
        assert!(recs
            .iter()
            .skip(1)
            .all(|r| r.distance_from_selected_mi <= 50.0));

        assert!(matches!(
            engine.recommend_for("missing", None),
            Err(AtlasError::NotFound { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = EngineConfig::from_json_str(
            r#"{"clustering": {"kValues": [10, 20]}, "maxDistanceMi": 25.0}"#,
        )
        .unwrap();
        assert_eq!(config.clustering.k_values, vec![10, 20]);
        assert_eq!(config.clustering.zoom_start, 8);
        assert_eq!(config.max_distance_mi, 25.0);
        assert_eq!(config.recommendation_limit, 10);

        assert!(EngineConfig::from_json_str(r#"{"cacheCapacity": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"clustering": {"kValues": []}}"#).is_err());
    }

    #[test]
    fn test_alerts_baseline_rejected_for_aqi() {
        let mut engine = AtlasEngine::new();
        assert!(engine.set_aqi_zones(Baseline::Alerts, vec![]).is_err());
    }

    #[test]
    fn test_clear() {
        let mut engine = loaded_engine();
        engine.clear();
        let stats = engine.stats();
        assert_eq!(stats.point_count, 0);
        assert_eq!(stats.alert_zone_count, 0);
        assert!(engine.visible_markers(&ViewState::default()).is_empty());
    }
}
