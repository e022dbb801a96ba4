//! Zoom-adaptive cluster layers.
//!
//! For every cluster count in a fixed ascending menu the combined point set
//! (trailheads, camping, fishing) is partitioned with k-means. Each tier is a
//! list of centroids carrying member counts, source-kind flags and a
//! classification of the centroid position. At render time the current zoom
//! picks one tier, or raw markers once zoomed in past `end_grouping_zoom`.
//!
//! Classification data changes (today/tomorrow AQI, alerts) only re-tag
//! centroids via [`ClusterLayers::reclassify`]; positions are reused.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize, Serializer};

use crate::classifier::Classifier;
use crate::error::{AtlasError, Result};
use crate::kmeans::{kmeans, KMeansParams};
use crate::{Category, GeoPoint, PointFeature, PointKind};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Configuration for cluster layers and zoom selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Cluster counts, one tier per entry, coarsest first.
    /// Default: [25, 50, 150, 250, 400]
    pub k_values: Vec<usize>,

    /// First zoom level that indexes into `k_values`. Lower zooms use `k_values[0]`.
    /// Default: 8
    pub zoom_start: u8,

    /// Zoom level from which clustering is off and raw markers are shown.
    /// Default: 13
    pub end_grouping_zoom: u8,

    /// Upper bound on k-means iterations per tier.
    /// Default: 100
    pub max_iterations: usize,

    /// Seed for k-means++ initialisation.
    /// Default: 42
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k_values: vec![25, 50, 150, 250, 400],
            zoom_start: 8,
            end_grouping_zoom: 13,
            max_iterations: 100,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    /// Reject menus that cannot be served.
    pub fn validate(&self) -> Result<()> {
        if self.k_values.is_empty() {
            return Err(AtlasError::Config {
                message: "k_values must not be empty".to_string(),
            });
        }
        if self.k_values.contains(&0) {
            return Err(AtlasError::Config {
                message: "k_values must be positive".to_string(),
            });
        }
        if self.k_values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AtlasError::Config {
                message: format!("k_values must be strictly ascending: {:?}", self.k_values),
            });
        }
        if self.end_grouping_zoom <= self.zoom_start {
            return Err(AtlasError::Config {
                message: format!(
                    "end_grouping_zoom ({}) must be greater than zoom_start ({})",
                    self.end_grouping_zoom, self.zoom_start
                ),
            });
        }
        let buckets = (self.end_grouping_zoom - self.zoom_start) as usize;
        if buckets != self.k_values.len() {
            debug!(
                "[ClusterConfig] {} zoom buckets for {} tiers, extra zooms reuse the last tier",
                buckets,
                self.k_values.len()
            );
        }
        Ok(())
    }

    pub fn kmeans_params(&self) -> KMeansParams {
        KMeansParams {
            max_iterations: self.max_iterations,
            seed: self.seed,
        }
    }
}

/// Which layer the map should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerSelection {
    /// Centroid tier for this cluster count
    Clustered(usize),
    /// Clustering off, individual markers
    Raw,
}

/// Pick the layer for a zoom level.
///
/// Step function on `ceil(zoom)`: up to `zoom_start` the coarsest tier, then
/// the tier at `ceil(zoom) - zoom_start` (clamped to the last tier), and raw
/// markers once `ceil(zoom)` reaches `end_grouping_zoom`. A fractional zoom
/// already shows the next level's layer.
///
/// # Example
/// ```
/// use outdoor_atlas::{select_layer_for_zoom, ClusterConfig, LayerSelection};
///
/// let config = ClusterConfig::default();
/// assert_eq!(select_layer_for_zoom(8.0, &config), LayerSelection::Clustered(25));
/// assert_eq!(select_layer_for_zoom(8.5, &config), LayerSelection::Clustered(50));
/// assert_eq!(select_layer_for_zoom(12.0, &config), LayerSelection::Clustered(400));
/// assert_eq!(select_layer_for_zoom(12.5, &config), LayerSelection::Raw);
/// ```
pub fn select_layer_for_zoom(zoom: f64, config: &ClusterConfig) -> LayerSelection {
    let Some(&coarsest) = config.k_values.first() else {
        return LayerSelection::Raw;
    };
    let bucket = zoom.ceil();
    if bucket >= config.end_grouping_zoom as f64 {
        return LayerSelection::Raw;
    }
    if !(bucket >= config.zoom_start as f64) {
        return LayerSelection::Clustered(coarsest);
    }
    let idx = ((bucket - config.zoom_start as f64) as usize).min(config.k_values.len() - 1);
    LayerSelection::Clustered(config.k_values[idx])
}

/// Which source kinds contributed members to a centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFlags {
    pub trailhead: bool,
    pub camping: bool,
    pub fishing: bool,
}

impl CategoryFlags {
    pub fn mark(&mut self, kind: PointKind) {
        match kind {
            PointKind::Trailhead => self.trailhead = true,
            PointKind::Camping => self.camping = true,
            PointKind::Fishing => self.fishing = true,
            PointKind::Other => {}
        }
    }

    pub fn contains(&self, kind: PointKind) -> bool {
        match kind {
            PointKind::Trailhead => self.trailhead,
            PointKind::Camping => self.camping,
            PointKind::Fishing => self.fishing,
            PointKind::Other => false,
        }
    }
}

fn serialize_lon_lat<S: Serializer>(
    point: &GeoPoint,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    point.to_lon_lat().serialize(serializer)
}

/// Representative marker for a group of points.
///
/// Serializes to the shape the rendering surface expects:
/// `{count, category, color, coordinates: [lon, lat], categoryFlags}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCentroid {
    #[serde(serialize_with = "serialize_lon_lat")]
    pub coordinates: GeoPoint,
    #[serde(rename = "count")]
    pub member_count: usize,
    pub category_flags: CategoryFlags,
    pub category: Option<Category>,
    pub color: Option<String>,
    #[serde(skip)]
    pub member_ids: Vec<String>,
}

impl ClusterCentroid {
    fn retagged<C: Classifier + ?Sized>(&self, classifier: &C) -> Self {
        let result = classifier.classify_point(&self.coordinates);
        Self {
            category: Some(result.category),
            color: Some(result.color),
            ..self.clone()
        }
    }
}

/// One centroid tier per configured cluster count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterLayers {
    layers: BTreeMap<usize, Vec<ClusterCentroid>>,
    point_count: usize,
}

impl ClusterLayers {
    /// Centroids for a cluster count, if that tier was built.
    pub fn get(&self, k: usize) -> Option<&[ClusterCentroid]> {
        self.layers.get(&k).map(Vec::as_slice)
    }

    /// Configured cluster counts, ascending.
    pub fn tiers(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers.keys().copied()
    }

    /// Number of input points the layers were built from.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn is_empty(&self) -> bool {
        self.layers.values().all(Vec::is_empty)
    }

    /// Centroids for the given layer selection. `Raw` has no centroids.
    pub fn for_selection(&self, selection: LayerSelection) -> Option<&[ClusterCentroid]> {
        match selection {
            LayerSelection::Clustered(k) => self.get(k),
            LayerSelection::Raw => None,
        }
    }

    /// Re-tag every centroid against new reference data without moving it.
    pub fn reclassify<C: Classifier + ?Sized>(&self, classifier: &C) -> Self {
        let layers = self
            .layers
            .iter()
            .map(|(&k, centroids)| (k, centroids.iter().map(|c| c.retagged(classifier)).collect()))
            .collect();
        Self {
            layers,
            point_count: self.point_count,
        }
    }
}

fn build_tier(
    points: &[PointFeature],
    coords: &[[f64; 2]],
    k: usize,
    params: &KMeansParams,
) -> Vec<ClusterCentroid> {
    let effective_k = k.min(points.len());
    if effective_k < k {
        warn!(
            "[Clustering] k={} exceeds {} points, clamping",
            k,
            points.len()
        );
    }

    let result = kmeans(coords, effective_k, params);

    let mut members: Vec<Vec<&PointFeature>> = vec![Vec::new(); result.centroids.len()];
    for (point, &c) in points.iter().zip(&result.assignments) {
        members[c].push(point);
    }

    let centroids: Vec<ClusterCentroid> = result
        .centroids
        .iter()
        .zip(members)
        .filter(|(_, members)| !members.is_empty())
        .map(|(centre, members)| {
            let mut flags = CategoryFlags::default();
            for member in &members {
                flags.mark(member.kind);
            }
            ClusterCentroid {
                coordinates: GeoPoint::from_lon_lat(centre[0], centre[1]),
                member_count: members.len(),
                category_flags: flags,
                category: None,
                color: None,
                member_ids: members.iter().map(|m| m.id.clone()).collect(),
            }
        })
        .collect();

    debug!(
        "[Clustering] k={} -> {} centroids after {} iterations",
        k,
        centroids.len(),
        result.iterations
    );
    centroids
}

/// Build one unclassified centroid tier per entry of `k_values`.
///
/// An empty point set yields empty tiers without running k-means. Zero
/// entries in `k_values` are skipped.
pub fn build_cluster_layers(
    points: &[PointFeature],
    k_values: &[usize],
    params: &KMeansParams,
) -> ClusterLayers {
    let tiers: Vec<usize> = k_values
        .iter()
        .copied()
        .filter(|&k| {
            if k == 0 {
                warn!("[Clustering] Skipping k=0 tier");
            }
            k > 0
        })
        .collect();

    if points.is_empty() {
        debug!("[Clustering] No points, emitting empty tiers");
        return ClusterLayers {
            layers: tiers.into_iter().map(|k| (k, Vec::new())).collect(),
            point_count: 0,
        };
    }

    let coords: Vec<[f64; 2]> = points
        .iter()
        .map(|p| [p.coordinates.longitude, p.coordinates.latitude])
        .collect();

    #[cfg(feature = "parallel")]
    let layers: BTreeMap<usize, Vec<ClusterCentroid>> = tiers
        .par_iter()
        .map(|&k| (k, build_tier(points, &coords, k, params)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    #[cfg(not(feature = "parallel"))]
    let layers: BTreeMap<usize, Vec<ClusterCentroid>> = tiers
        .iter()
        .map(|&k| (k, build_tier(points, &coords, k, params)))
        .collect();

    info!(
        "[Clustering] Built {} tiers over {} points",
        layers.len(),
        points.len()
    );

    ClusterLayers {
        layers,
        point_count: points.len(),
    }
}

/// Cluster `points` with `config` and classify every centroid.
///
/// Single entry point used for every point source (trailheads, facilities, ...).
pub fn classify_and_cluster<C: Classifier + ?Sized>(
    points: &[PointFeature],
    classifier: &C,
    config: &ClusterConfig,
) -> Result<ClusterLayers> {
    config.validate()?;
    let layers = build_cluster_layers(points, &config.k_values, &config.kmeans_params());
    Ok(layers.reclassify(classifier))
}
