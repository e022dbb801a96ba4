//! Trails and their difficulty metrics.
//!
//! Two closed-form difficulty scores are derived from length and elevation:
//! Petzoldt "energy miles" and the Shenandoah National Park difficulty rating.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geo_utils::meters_to_feet;
use crate::{Category, ClassificationResult, GeoPoint};

/// A trail segment (or a set of segments merged by place).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailFeature {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub length_mi: f64,
    pub min_elevation_m: f64,
    pub max_elevation_m: f64,
    /// One or more line strings
    pub lines: Vec<Vec<GeoPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_color: Option<String>,
}

impl TrailFeature {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        length_mi: f64,
        min_elevation_m: f64,
        max_elevation_m: f64,
        lines: Vec<Vec<GeoPoint>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            place_id: None,
            length_mi,
            min_elevation_m,
            max_elevation_m,
            lines,
            category: None,
            style_color: None,
        }
    }

    pub fn with_place_id(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = Some(place_id.into());
        self
    }

    /// Elevation range in feet.
    pub fn elevation_gain_ft(&self) -> f64 {
        meters_to_feet(self.max_elevation_m - self.min_elevation_m)
    }

    /// Petzoldt energy miles: two energy miles per 1000 ft of climb.
    pub fn energy_miles(&self) -> f64 {
        self.length_mi + self.elevation_gain_ft() / 500.0
    }

    /// Shenandoah difficulty: `sqrt(gain_ft * 2 * length_mi)`.
    pub fn shenandoah_difficulty(&self) -> f64 {
        (self.elevation_gain_ft() * 2.0 * self.length_mi).sqrt()
    }

    /// First coordinate of the first line.
    pub fn start_point(&self) -> Option<GeoPoint> {
        self.lines.iter().flatten().next().copied()
    }

    /// Named trails with a positive length are the only ones worth drawing.
    pub fn is_displayable(&self) -> bool {
        !self.name.is_empty() && self.length_mi > 0.0
    }

    /// Length colour ramp used for trail lines.
    pub fn length_color(&self) -> &'static str {
        length_color(self.length_mi)
    }

    /// A copy of this trail tagged with `result`.
    pub fn with_classification(&self, result: &ClassificationResult) -> Self {
        Self {
            category: Some(result.category),
            style_color: Some(result.color.clone()),
            ..self.clone()
        }
    }

    /// True if both difficulty metrics are within `tolerance` (relative) of `other`'s.
    pub fn is_similar_to(&self, other: &TrailFeature, tolerance: f64) -> bool {
        within_ratio(self.energy_miles(), other.energy_miles(), tolerance)
            && within_ratio(
                self.shenandoah_difficulty(),
                other.shenandoah_difficulty(),
                tolerance,
            )
    }
}

fn within_ratio(value: f64, reference: f64, tolerance: f64) -> bool {
    if !value.is_finite() || !reference.is_finite() {
        return false;
    }
    (value - reference).abs() <= tolerance * reference.abs()
}

/// Colour for a trail by length in miles.
pub fn length_color(length_mi: f64) -> &'static str {
    if length_mi < 1.0 {
        "#1eff00"
    } else if length_mi < 3.0 {
        "#e5ff00"
    } else if length_mi < 5.0 {
        "#ffb300"
    } else {
        "#ff2f00"
    }
}

/// Merge trail segments that share a `place_id` into one multi-line trail.
///
/// The first segment of each place provides id and name; lengths are summed
/// and the elevation range covers every segment. Trails without a place id
/// pass through unchanged. Output follows first-appearance order.
pub fn group_trails_by_place(trails: &[TrailFeature]) -> Vec<TrailFeature> {
    let mut merged: Vec<TrailFeature> = Vec::with_capacity(trails.len());
    let mut by_place: HashMap<&str, usize> = HashMap::new();

    for trail in trails {
        let Some(place_id) = trail.place_id.as_deref() else {
            merged.push(trail.clone());
            continue;
        };

        match by_place.get(place_id) {
            Some(&idx) => {
                let target = &mut merged[idx];
                target.lines.extend(trail.lines.iter().cloned());
                target.length_mi += trail.length_mi;
                target.min_elevation_m = target.min_elevation_m.min(trail.min_elevation_m);
                target.max_elevation_m = target.max_elevation_m.max(trail.max_elevation_m);
            }
            None => {
                by_place.insert(place_id, merged.len());
                merged.push(trail.clone());
            }
        }
    }

    merged
}
