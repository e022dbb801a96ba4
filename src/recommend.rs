//! Recommendation heuristic.
//!
//! Given a selected site, rank other sites by category severity first and
//! great-circle distance second, keeping only those within a distance budget
//! and an allowed category set. The trail variant pre-filters trails by
//! difficulty similarity before ranking.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;
use serde::Serialize;

use crate::classifier::Classifier;
use crate::geo_utils::{haversine_miles, round_hundredths};
use crate::trails::TrailFeature;
use crate::{Category, GeoPoint, PointFeature};

/// Options for a recommendation query.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendOptions {
    /// Candidates further than this from the origin are dropped.
    /// Default: 50.0 miles
    pub max_distance_mi: f64,

    /// Only candidates in one of these categories are returned.
    /// Default: every reported AQI and alert level
    pub allowed_categories: HashSet<Category>,

    /// Maximum number of candidates returned (origin not counted).
    /// Default: 10
    pub limit: usize,

    /// Prefix the result with the origin itself at distance 0.
    /// Default: true
    pub include_origin: bool,

    /// Relative tolerance for trail difficulty similarity.
    /// Default: 0.25 (within 25%)
    pub similarity_tolerance: f64,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            max_distance_mi: 50.0,
            allowed_categories: Category::all_reported().into_iter().collect(),
            limit: 10,
            include_origin: true,
            similarity_tolerance: 0.25,
        }
    }
}

impl RecommendOptions {
    /// Options seeded from the origin: every category of the origin's family
    /// that is no worse than the origin's own.
    pub fn for_origin(
        origin_category: Option<Category>,
        max_distance_mi: f64,
        limit: usize,
    ) -> Self {
        let allowed_categories = match origin_category {
            Some(category) => category.no_worse_than().into_iter().collect(),
            None => Category::all_reported().into_iter().collect(),
        };
        Self {
            max_distance_mi,
            allowed_categories,
            limit,
            ..Self::default()
        }
    }

    pub fn allow(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.allowed_categories = categories.into_iter().collect();
        self
    }
}

/// A recommended site with its distance from the selected one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(flatten)]
    pub feature: PointFeature,
    pub distance_from_selected_mi: f64,
}

/// A recommended trail with its distance from the selected one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailRecommendation {
    #[serde(flatten)]
    pub trail: TrailFeature,
    pub distance_from_selected_mi: f64,
}

trait Rankable {
    fn rank_id(&self) -> &str;
    fn rank_name(&self) -> &str;
    fn rank_category(&self) -> Option<Category>;
    fn rank_location(&self) -> Option<GeoPoint>;
}

impl Rankable for PointFeature {
    fn rank_id(&self) -> &str {
        &self.id
    }
    fn rank_name(&self) -> &str {
        &self.name
    }
    fn rank_category(&self) -> Option<Category> {
        self.category
    }
    fn rank_location(&self) -> Option<GeoPoint> {
        Some(self.coordinates)
    }
}

impl Rankable for TrailFeature {
    fn rank_id(&self) -> &str {
        &self.id
    }
    fn rank_name(&self) -> &str {
        &self.name
    }
    fn rank_category(&self) -> Option<Category> {
        self.category
    }
    fn rank_location(&self) -> Option<GeoPoint> {
        self.start_point()
    }
}

/// Filter and order candidates. Returns `(candidate, distance_mi)` pairs
/// without the origin.
fn rank<'a, T: Rankable>(
    origin: &T,
    candidates: impl IntoIterator<Item = &'a T>,
    options: &RecommendOptions,
) -> Vec<(&'a T, f64)>
where
    T: 'a,
{
    let Some(origin_location) = origin.rank_location() else {
        return vec![];
    };

    let mut ranked: Vec<(&T, Category, f64)> = candidates
        .into_iter()
        .filter(|c| c.rank_id() != origin.rank_id() && !c.rank_name().is_empty())
        .filter_map(|c| {
            let category = c.rank_category()?;
            let location = c.rank_location()?;
            let distance = round_hundredths(haversine_miles(&origin_location, &location));
            if distance > options.max_distance_mi {
                return None;
            }
            if !options.allowed_categories.contains(&category) {
                return None;
            }
            Some((c, category, distance))
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.1.rank()
            .cmp(&b.1.rank())
            .then_with(|| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
    });
    ranked.truncate(options.limit);

    ranked.into_iter().map(|(c, _, d)| (c, d)).collect()
}

/// Recommend sites near `origin`.
///
/// Drops the origin itself, unnamed or unclassified candidates, candidates further than
/// `max_distance_mi` and categories outside `allowed_categories`. Sorts by
/// category rank then distance, keeps `limit`, and prefixes the origin when
/// `include_origin` is set.
///
/// # Example
/// ```
/// use outdoor_atlas::{recommend, RecommendOptions, PointFeature, PointKind, GeoPoint,
///     ClassificationResult, Category, AlertLevel};
///
/// let none = ClassificationResult::new("#00E400", Category::Alert(AlertLevel::None));
/// let origin = PointFeature::new("o", "Origin", PointKind::Trailhead, GeoPoint::new(39.0, -105.78))
///     .with_classification(&none);
/// let near = PointFeature::new("n", "Near", PointKind::Trailhead, GeoPoint::new(39.0, -105.80))
///     .with_classification(&none);
///
/// let recs = recommend(&origin, &[near], &RecommendOptions::default());
/// assert_eq!(recs.len(), 2);
/// assert_eq!(recs[0].feature.id, "o");
/// assert_eq!(recs[1].feature.id, "n");
/// ```
pub fn recommend(
    origin: &PointFeature,
    candidates: &[PointFeature],
    options: &RecommendOptions,
) -> Vec<Recommendation> {
    let ranked = rank(origin, candidates, options);
    debug!(
        "[Recommend] {} of {} candidates kept for '{}'",
        ranked.len(),
        candidates.len(),
        origin.id
    );

    let mut result = Vec::with_capacity(ranked.len() + 1);
    if options.include_origin {
        result.push(Recommendation {
            feature: origin.clone(),
            distance_from_selected_mi: 0.0,
        });
    }
    result.extend(ranked.into_iter().map(|(feature, distance)| Recommendation {
        feature: feature.clone(),
        distance_from_selected_mi: distance,
    }));
    result
}

/// Recommend trails similar in difficulty to `origin`.
///
/// Trails whose energy miles and Shenandoah difficulty are both within
/// `similarity_tolerance` of the origin's are classified at their start point
/// and then ranked exactly like [`recommend`]. Trails without coordinates,
/// without a name or with no length are skipped.
pub fn recommend_similar_trails<C: Classifier + ?Sized>(
    origin: &TrailFeature,
    trails: &[TrailFeature],
    classifier: &C,
    options: &RecommendOptions,
) -> Vec<TrailRecommendation> {
    let Some(origin_start) = origin.start_point() else {
        debug!("[Recommend] Trail '{}' has no coordinates", origin.id);
        return vec![];
    };
    let origin = origin.with_classification(&classifier.classify_point(&origin_start));

    let similar: Vec<TrailFeature> = trails
        .iter()
        .filter(|t| t.id != origin.id && t.is_displayable())
        .filter(|t| t.is_similar_to(&origin, options.similarity_tolerance))
        .filter_map(|t| {
            let start = t.start_point()?;
            Some(t.with_classification(&classifier.classify_point(&start)))
        })
        .collect();

    debug!(
        "[Recommend] {} of {} trails similar to '{}'",
        similar.len(),
        trails.len(),
        origin.id
    );

    let ranked = rank(&origin, &similar, options);

    let mut result = Vec::with_capacity(ranked.len() + 1);
    let ranked: Vec<TrailRecommendation> = ranked
        .into_iter()
        .map(|(trail, distance)| TrailRecommendation {
            trail: trail.clone(),
            distance_from_selected_mi: distance,
        })
        .collect();
    if options.include_origin {
        result.push(TrailRecommendation {
            trail: origin,
            distance_from_selected_mi: 0.0,
        });
    }
    result.extend(ranked);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertLevel, ClassificationResult, PointKind, PolygonFeature};
    use geo::{polygon, MultiPolygon};

    const CAT_A: Category = Category::Alert(AlertLevel::None);
    const CAT_B: Category = Category::Alert(AlertLevel::SmokeDust);

    fn site(id: &str, lng: f64, lat: f64, category: Option<Category>) -> PointFeature {
        let p = PointFeature::new(id, id, PointKind::Trailhead, GeoPoint::from_lon_lat(lng, lat));
        match category {
            Some(c) => p.with_classification(&ClassificationResult::new(c.color(), c)),
            None => p,
        }
    }

    fn options(max_distance_mi: f64, limit: usize) -> RecommendOptions {
        RecommendOptions {
            max_distance_mi,
            limit,
            ..RecommendOptions::default()
        }
        .allow([CAT_A, CAT_B])
    }

    #[test]
    fn test_end_to_end_example() {
        let origin = site("origin", -105.78, 39.0, Some(CAT_A));
        let candidates = vec![
            site("c1", -105.80, 39.0, Some(CAT_A)),
            site("c2", -105.90, 39.0, Some(CAT_A)),
            site("c3", -106.0, 39.0, Some(CAT_B)),
        ];
        let recs = recommend(&origin, &candidates, &options(10.0, 2));
        let ids: Vec<&str> = recs.iter().map(|r| r.feature.id.as_str()).collect();
        assert_eq!(ids, vec!["origin", "c1", "c2"]);
        assert_eq!(recs[0].distance_from_selected_mi, 0.0);
        assert!(recs[1].distance_from_selected_mi < recs[2].distance_from_selected_mi);
        assert!(recs[2].distance_from_selected_mi <= 10.0);
    }

    #[test]
    fn test_distance_filter() {
        let origin = site("origin", -105.78, 39.0, Some(CAT_A));
        let candidates: Vec<PointFeature> = (1..40)
            .map(|i| site(&format!("c{}", i), -105.78 - i as f64 * 0.05, 39.0, Some(CAT_A)))
            .collect();
        let recs = recommend(&origin, &candidates, &options(25.0, 100));
        assert!(recs.len() > 1);
        for r in recs.iter().skip(1) {
            assert!(r.distance_from_selected_mi <= 25.0);
        }
    }

    #[test]
    fn test_category_rank_beats_distance() {
        let origin = site("origin", -105.78, 39.0, Some(CAT_B));
        let candidates = vec![
            site("near-worse", -105.79, 39.0, Some(CAT_B)),
            site("far-better", -106.2, 39.0, Some(CAT_A)),
        ];
        let recs = recommend(&origin, &candidates, &options(50.0, 10));
        assert_eq!(recs[1].feature.id, "far-better");
        assert_eq!(recs[2].feature.id, "near-worse");
    }

    #[test]
    fn test_excludes_origin_unclassified_and_disallowed() {
        let origin = site("origin", -105.78, 39.0, Some(CAT_A));
        let candidates = vec![
            origin.clone(),
            site("unclassified", -105.79, 39.0, None),
            site("disallowed", -105.79, 39.0, Some(Category::Alert(AlertLevel::Multiple))),
            site("ok", -105.79, 39.0, Some(CAT_A)),
        ];
        let recs = recommend(&origin, &candidates, &options(50.0, 10));
        let ids: Vec<&str> = recs.iter().map(|r| r.feature.id.as_str()).collect();
        assert_eq!(ids, vec!["origin", "ok"]);
    }

    #[test]
    fn test_skips_unnamed_candidates() {
        let origin = site("o", -105.78, 39.0, Some(CAT_A));
        let mut unnamed = site("u", -105.80, 39.0, Some(CAT_A));
        unnamed.name.clear();
        let recs = recommend(&origin, &[unnamed], &options(10.0, 5));
        let ids: Vec<&str> = recs.iter().map(|r| r.feature.id.as_str()).collect();
        assert_eq!(ids, vec!["o"]);
    }

    #[test]
    fn test_empty_candidates() {
        let origin = site("origin", -105.78, 39.0, Some(CAT_A));
        let recs = recommend(&origin, &[], &RecommendOptions::default());
        assert_eq!(recs.len(), 1);

        let no_origin = RecommendOptions {
            include_origin: false,
            ..RecommendOptions::default()
        };
        assert!(recommend(&origin, &[], &no_origin).is_empty());
    }

    #[test]
    fn test_for_origin_allows_no_worse() {
        let opts = RecommendOptions::for_origin(Some(CAT_B), 30.0, 5);
        assert!(opts.allowed_categories.contains(&CAT_A));
        assert!(opts.allowed_categories.contains(&CAT_B));
        assert!(!opts
            .allowed_categories
            .contains(&Category::Alert(AlertLevel::OzonePm)));
        assert_eq!(opts.limit, 5);
    }

    #[test]
    fn test_serializes_with_distance() {
        let origin = site("origin", -105.78, 39.0, Some(CAT_A));
        let recs = recommend(&origin, &[site("c1", -105.80, 39.0, Some(CAT_A))], &options(10.0, 1));
        let json = serde_json::to_value(&recs[1]).unwrap();
        assert_eq!(json["id"], "c1");
        assert!(json["distanceFromSelectedMi"].as_f64().unwrap() > 0.0);
    }

    fn trail(id: &str, lng: f64, length_mi: f64, gain_m: f64) -> TrailFeature {
        TrailFeature::new(
            id,
            id,
            length_mi,
            2500.0,
            2500.0 + gain_m,
            vec![vec![
                GeoPoint::from_lon_lat(lng, 39.0),
                GeoPoint::from_lon_lat(lng + 0.01, 39.01),
            ]],
        )
    }

    #[test]
    fn test_similar_trails() {
        let zone = vec![PolygonFeature::new(
            "county",
            MultiPolygon::new(vec![polygon![
                (x: -107.0, y: 38.0),
                (x: -105.0, y: 38.0),
                (x: -105.0, y: 40.0),
                (x: -107.0, y: 40.0),
                (x: -107.0, y: 38.0),
            ]]),
            CAT_A,
        )];
        let origin = trail("origin", -105.78, 4.0, 300.0);
        let trails = vec![
            origin.clone(),
            trail("similar-far", -105.95, 4.2, 310.0),
            trail("similar-near", -105.80, 3.8, 290.0),
            trail("too-hard", -105.79, 10.0, 900.0),
            trail("outside-zone", -104.5, 4.0, 300.0),
        ];

        let recs = recommend_similar_trails(&origin, &trails, &zone, &options(50.0, 10));
        let ids: Vec<&str> = recs.iter().map(|r| r.trail.id.as_str()).collect();
        // outside-zone classifies as N/A, which is not allowed
        assert_eq!(ids, vec!["origin", "similar-near", "similar-far"]);
        assert_eq!(recs[0].trail.category, Some(CAT_A));
    }

    #[test]
    fn test_similar_trails_skip_undisplayable() {
        let zone = vec![PolygonFeature::new(
            "county",
            MultiPolygon::new(vec![polygon![
                (x: -107.0, y: 38.0),
                (x: -105.0, y: 38.0),
                (x: -105.0, y: 40.0),
                (x: -107.0, y: 40.0),
                (x: -107.0, y: 38.0),
            ]]),
            CAT_A,
        )];
        let origin = trail("origin", -105.78, 4.0, 300.0);
        let mut unnamed = trail("unnamed", -105.80, 4.0, 300.0);
        unnamed.name.clear();
        let trails = vec![unnamed, trail("named", -105.81, 4.0, 300.0)];

        let recs = recommend_similar_trails(&origin, &trails, &zone, &options(50.0, 10));
        let ids: Vec<&str> = recs.iter().map(|r| r.trail.id.as_str()).collect();
        assert_eq!(ids, vec!["origin", "named"]);
    }
}
