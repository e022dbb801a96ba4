//! Point-in-polygon classification against ordered reference zones.
//!
//! The first polygon in input order that intersects the point wins. Points
//! outside every polygon get [`ClassificationResult::fallback`]. The R-tree
//! backed [`PolygonIndex`] returns exactly the same result as the linear
//! scan; it only narrows the candidates it has to test.

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::{ClassificationResult, GeoPoint, PointFeature, PolygonFeature};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Anything that can assign a category to a coordinate.
pub trait Classifier {
    fn classify_point(&self, point: &GeoPoint) -> ClassificationResult;
}

/// Classify a point by linear scan over `polygons`.
///
/// O(P) per point. Deterministic for a fixed polygon order.
pub fn classify(point: &GeoPoint, polygons: &[PolygonFeature]) -> ClassificationResult {
    polygons
        .iter()
        .find(|polygon| polygon.intersects_point(point))
        .map(PolygonFeature::classification)
        .unwrap_or_else(ClassificationResult::fallback)
}

impl Classifier for [PolygonFeature] {
    fn classify_point(&self, point: &GeoPoint) -> ClassificationResult {
        classify(point, self)
    }
}

impl Classifier for Vec<PolygonFeature> {
    fn classify_point(&self, point: &GeoPoint) -> ClassificationResult {
        classify(point, self)
    }
}

/// Envelope of one reference polygon, tagged with its input position.
#[derive(Debug, Clone)]
struct ZoneEnvelope {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over polygon envelopes with first-match-in-input-order semantics.
#[derive(Debug, Clone)]
pub struct PolygonIndex {
    polygons: Vec<PolygonFeature>,
    tree: RTree<ZoneEnvelope>,
}

impl PolygonIndex {
    /// Build the index. Polygons without a bounding box (empty geometry) can
    /// never match and are left out of the tree.
    pub fn new(polygons: Vec<PolygonFeature>) -> Self {
        let envelopes: Vec<ZoneEnvelope> = polygons
            .iter()
            .enumerate()
            .filter_map(|(idx, polygon)| {
                polygon.bounding_rect().map(|rect| ZoneEnvelope {
                    idx,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        debug!(
            "[PolygonIndex] Indexed {} of {} polygons",
            envelopes.len(),
            polygons.len()
        );

        Self {
            polygons,
            tree: RTree::bulk_load(envelopes),
        }
    }

    pub fn polygons(&self) -> &[PolygonFeature] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Classify a point. Identical to [`classify`] over the same polygons.
    pub fn classify(&self, point: &GeoPoint) -> ClassificationResult {
        let query = AABB::from_point([point.longitude, point.latitude]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(|zone| zone.idx)
            .filter(|&idx| self.polygons[idx].intersects_point(point))
            .min()
            .map(|idx| self.polygons[idx].classification())
            .unwrap_or_else(ClassificationResult::fallback)
    }
}

impl Classifier for PolygonIndex {
    fn classify_point(&self, point: &GeoPoint) -> ClassificationResult {
        self.classify(point)
    }
}

/// Decorate every point with its classification.
///
/// Pure mapping: the input points are not modified.
pub fn classify_points<C: Classifier + ?Sized>(
    points: &[PointFeature],
    classifier: &C,
) -> Vec<PointFeature> {
    points
        .iter()
        .map(|point| point.with_classification(&classifier.classify_point(&point.coordinates)))
        .collect()
}

/// Parallel version of [`classify_points`]. Output order matches input order.
#[cfg(feature = "parallel")]
pub fn classify_points_parallel<C: Classifier + Sync + ?Sized>(
    points: &[PointFeature],
    classifier: &C,
) -> Vec<PointFeature> {
    points
        .par_iter()
        .map(|point| point.with_classification(&classifier.classify_point(&point.coordinates)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertLevel, AqiLevel, Category, PointKind};
    use geo::{polygon, MultiPolygon};

    fn rect_zone(id: &str, min: (f64, f64), max: (f64, f64), category: Category) -> PolygonFeature {
        PolygonFeature::new(
            id,
            MultiPolygon::new(vec![polygon![
                (x: min.0, y: min.1),
                (x: max.0, y: min.1),
                (x: max.0, y: max.1),
                (x: min.0, y: max.1),
                (x: min.0, y: min.1),
            ]]),
            category,
        )
    }

    fn zones() -> Vec<PolygonFeature> {
        vec![
            rect_zone("west", (-107.0, 38.0), (-105.5, 40.0), Category::Aqi(AqiLevel::Moderate)),
            rect_zone("wide", (-106.0, 38.0), (-104.0, 40.0), Category::Aqi(AqiLevel::Good)),
            rect_zone("south", (-105.0, 36.0), (-103.0, 37.5), Category::Aqi(AqiLevel::Unhealthy)),
        ]
    }

    #[test]
    fn test_single_polygon_match() {
        let result = classify(&GeoPoint::new(37.0, -104.0), &zones());
        assert_eq!(result.category, Category::Aqi(AqiLevel::Unhealthy));
        assert_eq!(result.color, "#ff0000");
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        // (-105.78, 39.0) is inside both "west" and "wide"
        let point = GeoPoint::new(39.0, -105.78);
        let result = classify(&point, &zones());
        assert_eq!(result.category, Category::Aqi(AqiLevel::Moderate));

        let mut reversed = zones();
        reversed.swap(0, 1);
        let result = classify(&point, &reversed);
        assert_eq!(result.category, Category::Aqi(AqiLevel::Good));
    }

    #[test]
    fn test_no_match_falls_back() {
        let result = classify(&GeoPoint::new(45.0, -100.0), &zones());
        assert_eq!(result, ClassificationResult::fallback());
        assert_eq!(result.color, "black");
        assert_eq!(result.category.label(), "N/A");

        let empty: Vec<PolygonFeature> = vec![];
        assert!(classify(&GeoPoint::new(39.0, -105.0), &empty).is_fallback());
    }

    #[test]
    fn test_deterministic() {
        let point = GeoPoint::new(39.0, -105.78);
        let first = classify(&point, &zones());
        for _ in 0..10 {
            assert_eq!(classify(&point, &zones()), first);
        }
    }

    #[test]
    fn test_index_matches_linear_scan() {
        let index = PolygonIndex::new(zones());
        let probes = [
            GeoPoint::new(39.0, -105.78),
            GeoPoint::new(39.0, -104.5),
            GeoPoint::new(37.0, -104.0),
            GeoPoint::new(38.0, -105.5),
            GeoPoint::new(45.0, -100.0),
            GeoPoint::new(37.5, -103.0),
        ];
        for probe in probes {
            assert_eq!(index.classify(&probe), classify(&probe, &zones()), "probe {:?}", probe);
        }
    }

    #[test]
    fn test_classify_points_pure_mapping() {
        let points = vec![
            PointFeature::new("a", "A", PointKind::Trailhead, GeoPoint::new(39.0, -105.78)),
            PointFeature::new("b", "B", PointKind::Camping, GeoPoint::new(45.0, -100.0)),
        ];
        let alert_zone = vec![rect_zone(
            "county",
            (-106.0, 38.5),
            (-105.5, 39.5),
            Category::Alert(AlertLevel::SmokeDust),
        )];
        let tagged = classify_points(&points, &alert_zone);

        assert!(points.iter().all(|p| p.category.is_none()));
        assert_eq!(tagged[0].category, Some(Category::Alert(AlertLevel::SmokeDust)));
        assert_eq!(tagged[1].category, Some(Category::Unavailable));
        assert_eq!(tagged[1].style_color.as_deref(), Some("black"));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let points: Vec<PointFeature> = (0..200)
            .map(|i| {
                PointFeature::new(
                    format!("p{}", i),
                    "",
                    PointKind::Trailhead,
                    GeoPoint::new(36.5 + (i as f64) * 0.02, -106.5 + (i as f64) * 0.015),
                )
            })
            .collect();
        let index = PolygonIndex::new(zones());
        assert_eq!(classify_points(&points, &index), classify_points_parallel(&points, &index));
    }
}
