//! Air-quality and alert categories, their severity ranks and display styles.
//!
//! Categories form a closed set. AQI levels come from the AirNow forecast
//! polygons (`styleUrl` property), alert levels from NWS air-quality alerts
//! aggregated per county. `Category::Unavailable` is the classifier fallback.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Colour used for points that fall outside every reference polygon.
pub const FALLBACK_COLOR: &str = "black";

/// Label used for points that fall outside every reference polygon.
pub const FALLBACK_LABEL: &str = "N/A";

/// AirNow AQI forecast level, in ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    /// Forecast exists but no level was published for the zone
    Unavailable,
    /// Zone drawn without fill, used by the feed for outlines
    Invisible,
}

impl AqiLevel {
    pub const ALL: [AqiLevel; 8] = [
        AqiLevel::Good,
        AqiLevel::Moderate,
        AqiLevel::UnhealthySensitive,
        AqiLevel::Unhealthy,
        AqiLevel::VeryUnhealthy,
        AqiLevel::Hazardous,
        AqiLevel::Unavailable,
        AqiLevel::Invisible,
    ];

    /// Parse the KML style reference carried by AirNow polygons (`#Good`, `#UnhealthySG`, ...).
    pub fn from_style_url(style_url: &str) -> Option<Self> {
        match style_url.trim().trim_start_matches('#') {
            "Good" => Some(AqiLevel::Good),
            "Moderate" => Some(AqiLevel::Moderate),
            "UnhealthySG" => Some(AqiLevel::UnhealthySensitive),
            "Unhealthy" => Some(AqiLevel::Unhealthy),
            "VeryUnhealthy" => Some(AqiLevel::VeryUnhealthy),
            "Hazardous" => Some(AqiLevel::Hazardous),
            "Unavailable" => Some(AqiLevel::Unavailable),
            "Invisible" => Some(AqiLevel::Invisible),
            _ => None,
        }
    }

    pub fn style_url(&self) -> &'static str {
        match self {
            AqiLevel::Good => "#Good",
            AqiLevel::Moderate => "#Moderate",
            AqiLevel::UnhealthySensitive => "#UnhealthySG",
            AqiLevel::Unhealthy => "#Unhealthy",
            AqiLevel::VeryUnhealthy => "#VeryUnhealthy",
            AqiLevel::Hazardous => "#Hazardous",
            AqiLevel::Unavailable => "#Unavailable",
            AqiLevel::Invisible => "#Invisible",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiLevel::Good => "Good",
            AqiLevel::Moderate => "Moderate",
            AqiLevel::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiLevel::Unhealthy => "Unhealthy",
            AqiLevel::VeryUnhealthy => "Very Unhealthy",
            AqiLevel::Hazardous => "Hazardous",
            AqiLevel::Unavailable => "Unavailable",
            AqiLevel::Invisible => "Invisible",
        }
    }

    /// True for levels that describe actual air quality.
    pub fn is_reported(&self) -> bool {
        !matches!(self, AqiLevel::Unavailable | AqiLevel::Invisible)
    }

    pub fn style(&self) -> &'static AqiStyle {
        &AQI_STYLES[self]
    }
}

/// County air-quality alert level, in ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertLevel {
    None,
    SmokeDust,
    OzonePm,
    Multiple,
}

impl AlertLevel {
    pub const ALL: [AlertLevel; 4] = [
        AlertLevel::None,
        AlertLevel::SmokeDust,
        AlertLevel::OzonePm,
        AlertLevel::Multiple,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::None => "None",
            AlertLevel::SmokeDust => "Smoke/Dust",
            AlertLevel::OzonePm => "Ozone/PM",
            AlertLevel::Multiple => "Multiple",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        AlertLevel::ALL.into_iter().find(|l| l.label() == label)
    }

    pub fn color(&self) -> &'static str {
        match self {
            AlertLevel::None => "#00E400",
            AlertLevel::SmokeDust => "#8d6e63",
            AlertLevel::OzonePm => "#ff7e00",
            AlertLevel::Multiple => "#7b1fa2",
        }
    }

    /// Combine the levels of every alert active in one zone.
    ///
    /// No alerts is `None`; one distinct level is kept as is; two or more
    /// distinct levels become `Multiple`.
    pub fn combine<I: IntoIterator<Item = AlertLevel>>(levels: I) -> AlertLevel {
        let mut found: Option<AlertLevel> = None;
        for level in levels {
            if level == AlertLevel::None {
                continue;
            }
            match found {
                None => found = Some(level),
                Some(prev) if prev == level => {}
                Some(_) => return AlertLevel::Multiple,
            }
        }
        found.unwrap_or(AlertLevel::None)
    }
}

/// A classification category with a total severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Aqi(AqiLevel),
    Alert(AlertLevel),
    /// No reference polygon contained the point
    Unavailable,
}

impl Category {
    /// Severity rank, lower is better. `Unavailable` sorts after everything.
    pub fn rank(&self) -> u32 {
        match self {
            Category::Aqi(level) => *level as u32,
            Category::Alert(level) => *level as u32,
            Category::Unavailable => u32::MAX,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Aqi(level) => level.label(),
            Category::Alert(level) => level.label(),
            Category::Unavailable => FALLBACK_LABEL,
        }
    }

    /// Parse a label produced by [`Category::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        if label == FALLBACK_LABEL {
            return Some(Category::Unavailable);
        }
        if let Some(level) = AlertLevel::from_label(label) {
            return Some(Category::Alert(level));
        }
        AqiLevel::ALL
            .into_iter()
            .find(|l| l.label() == label)
            .map(Category::Aqi)
    }

    /// Display colour for markers of this category.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Aqi(level) => level.style().color,
            Category::Alert(level) => level.color(),
            Category::Unavailable => FALLBACK_COLOR,
        }
    }

    /// True if both categories come from the same reference family.
    /// Every category of this family ranked no worse than `self`.
    pub fn no_worse_than(&self) -> Vec<Category> {
        match self {
            Category::Aqi(level) => AqiLevel::ALL
                .into_iter()
                .filter(|l| l.is_reported() && l <= level)
                .map(Category::Aqi)
                .collect(),
            Category::Alert(level) => AlertLevel::ALL
                .into_iter()
                .filter(|l| l <= level)
                .map(Category::Alert)
                .collect(),
            Category::Unavailable => Category::all_reported(),
        }
    }

    /// Every category that describes a real condition.
    pub fn all_reported() -> Vec<Category> {
        AqiLevel::ALL
            .into_iter()
            .filter(|l| l.is_reported())
            .map(Category::Aqi)
            .chain(AlertLevel::ALL.into_iter().map(Category::Alert))
            .collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category '{}'", label)))
    }
}

/// Polygon style for an AQI zone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AqiStyle {
    pub fill_color: &'static str,
    pub fill_opacity: f32,
    pub color: &'static str,
    pub opacity: f32,
    pub weight: u8,
}

static AQI_STYLES: Lazy<HashMap<AqiLevel, AqiStyle>> = Lazy::new(|| {
    let style = |fill_color: &'static str, fill_opacity: f32| AqiStyle {
        fill_color,
        fill_opacity,
        color: fill_color,
        opacity: 1.0,
        weight: 2,
    };
    HashMap::from([
        (AqiLevel::Unavailable, style("#cccccc", 0.4)),
        (AqiLevel::Invisible, style("#000000", 0.0)),
        (AqiLevel::Good, style("#00E400", 0.151)),
        (AqiLevel::Moderate, style("#ffff00", 0.201)),
        (AqiLevel::UnhealthySensitive, style("#ff7e00", 0.251)),
        (AqiLevel::Unhealthy, style("#ff0000", 0.251)),
        (AqiLevel::VeryUnhealthy, style("#99004c", 0.251)),
        (AqiLevel::Hazardous, style("#7e0023", 0.251)),
    ])
});

/// Look up the polygon style for a raw `styleUrl` value.
pub fn style_for_aqi(style_url: &str) -> Option<&'static AqiStyle> {
    AqiLevel::from_style_url(style_url).map(|level| level.style())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_url_parsing() {
        assert_eq!(AqiLevel::from_style_url("#Good"), Some(AqiLevel::Good));
        assert_eq!(
            AqiLevel::from_style_url("#UnhealthySG"),
            Some(AqiLevel::UnhealthySensitive)
        );
        assert_eq!(AqiLevel::from_style_url("#Purple"), None);
        for level in AqiLevel::ALL {
            assert_eq!(AqiLevel::from_style_url(level.style_url()), Some(level));
        }
    }

    #[test]
    fn test_every_level_has_style() {
        for level in AqiLevel::ALL {
            let style = level.style();
            assert_eq!(style.color, style.fill_color);
        }
        assert_eq!(style_for_aqi("#Hazardous").unwrap().color, "#7e0023");
        assert!(style_for_aqi("nope").is_none());
    }

    #[test]
    fn test_rank_order() {
        assert!(Category::Aqi(AqiLevel::Good).rank() < Category::Aqi(AqiLevel::Moderate).rank());
        assert!(
            Category::Alert(AlertLevel::None).rank() < Category::Alert(AlertLevel::OzonePm).rank()
        );
        assert_eq!(Category::Unavailable.rank(), u32::MAX);
        assert!(
            Category::Aqi(AqiLevel::Hazardous).rank() < Category::Aqi(AqiLevel::Unavailable).rank()
        );
    }

    #[test]
    fn test_combine_alert_levels() {
        assert_eq!(AlertLevel::combine(vec![]), AlertLevel::None);
        assert_eq!(
            AlertLevel::combine(vec![AlertLevel::SmokeDust, AlertLevel::SmokeDust]),
            AlertLevel::SmokeDust
        );
        assert_eq!(
            AlertLevel::combine(vec![AlertLevel::SmokeDust, AlertLevel::OzonePm]),
            AlertLevel::Multiple
        );
        assert_eq!(
            AlertLevel::combine(vec![AlertLevel::None, AlertLevel::OzonePm]),
            AlertLevel::OzonePm
        );
    }

    #[test]
    fn test_label_round_trip_and_serde() {
        for cat in Category::all_reported() {
            assert_eq!(Category::from_label(cat.label()), Some(cat));
        }
        let json = serde_json::to_string(&Category::Alert(AlertLevel::SmokeDust)).unwrap();
        assert_eq!(json, "\"Smoke/Dust\"");
        let back: Category = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(back, Category::Unavailable);
        assert!(serde_json::from_str::<Category>("\"Sunny\"").is_err());
    }

    #[test]
    fn test_no_worse_than() {
        let allowed = Category::Alert(AlertLevel::SmokeDust).no_worse_than();
        assert_eq!(
            allowed,
            vec![
                Category::Alert(AlertLevel::None),
                Category::Alert(AlertLevel::SmokeDust)
            ]
        );
        let allowed = Category::Aqi(AqiLevel::Moderate).no_worse_than();
        assert_eq!(allowed.len(), 2);
        assert!(Category::Unavailable.no_worse_than().len() > 6);
    }
}
