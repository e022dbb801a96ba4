//! View state and visible layer selection.
//!
//! The map surface owns a [`ViewState`] (zoom, baseline toggle, source
//! filters). Which layer to draw is a pure function of that state, so it can
//! be tested without any event wiring.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clustering::{select_layer_for_zoom, ClusterConfig, LayerSelection};
use crate::PointKind;

/// Reference data the markers are coloured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    /// Today's AQI forecast
    #[default]
    Today,
    /// Tomorrow's AQI forecast
    Tomorrow,
    /// Active NWS air-quality alerts per county
    Alerts,
}

impl Baseline {
    pub const ALL: [Baseline; 3] = [Baseline::Today, Baseline::Tomorrow, Baseline::Alerts];
}

/// Everything the map needs to decide what to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewState {
    pub zoom: f64,
    pub baseline: Baseline,
    /// Source kinds currently switched on
    pub active_filters: BTreeSet<PointKind>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 7.0,
            baseline: Baseline::Today,
            active_filters: [PointKind::Trailhead, PointKind::Camping, PointKind::Fishing]
                .into_iter()
                .collect(),
        }
    }
}

impl ViewState {
    pub fn new(zoom: f64, baseline: Baseline) -> Self {
        Self {
            zoom,
            baseline,
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, kinds: impl IntoIterator<Item = PointKind>) -> Self {
        self.active_filters = kinds.into_iter().collect();
        self
    }

    /// Flip one source filter. Returns whether it is now active.
    pub fn toggle_filter(&mut self, kind: PointKind) -> bool {
        if self.active_filters.remove(&kind) {
            false
        } else {
            self.active_filters.insert(kind);
            true
        }
    }

    pub fn is_active(&self, kind: PointKind) -> bool {
        self.active_filters.contains(&kind)
    }
}

/// Identifies exactly one drawable layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerId {
    pub baseline: Baseline,
    pub selection: LayerSelection,
    /// Active source kinds, sorted
    pub kinds: Vec<PointKind>,
}

impl LayerId {
    pub fn is_raw(&self) -> bool {
        self.selection == LayerSelection::Raw
    }
}

/// The layer that should be visible for `state`.
///
/// # Example
/// ```
/// use outdoor_atlas::{compute_visible_layer, Baseline, ClusterConfig, LayerSelection, ViewState};
///
/// let state = ViewState::new(9.0, Baseline::Alerts);
/// let layer = compute_visible_layer(&state, &ClusterConfig::default());
/// assert_eq!(layer.selection, LayerSelection::Clustered(50));
/// assert_eq!(layer.baseline, Baseline::Alerts);
/// ```
pub fn compute_visible_layer(state: &ViewState, config: &ClusterConfig) -> LayerId {
    LayerId {
        baseline: state.baseline,
        selection: select_layer_for_zoom(state.zoom, config),
        kinds: state.active_filters.iter().copied().collect(),
    }
}
