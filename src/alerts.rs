//! National Weather Service alerts and county alert zones.
//!
//! Active alerts come from the NWS CAP feed (`/alerts/active/area/{state}`)
//! as a GeoJSON feature collection. Only the properties are used; county
//! geometry comes from a separate boundary dataset and is matched by name or
//! FIPS code.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{AlertLevel, Category, PolygonFeature};

/// Geographic codes attached to an alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geocode {
    /// SAME codes: `0` + state FIPS + county FIPS
    #[serde(rename = "SAME", default)]
    pub same: Vec<String>,
    #[serde(rename = "UGC", default)]
    pub ugc: Vec<String>,
}

/// The properties of one active NWS alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub area_desc: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub geocode: Geocode,
}

#[derive(Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Deserialize)]
struct AlertFeature {
    properties: WeatherAlert,
}

/// Parse an NWS alert collection.
pub fn parse_alerts(json: &str) -> Result<Vec<WeatherAlert>> {
    let collection: AlertCollection = serde_json::from_str(json)?;
    let alerts: Vec<WeatherAlert> = collection.features.into_iter().map(|f| f.properties).collect();
    info!("[Alerts] Parsed {} active alerts", alerts.len());
    Ok(alerts)
}

/// The sections of an NWS alert narrative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDescription {
    pub issuer: String,
    pub what: String,
    #[serde(rename = "where")]
    pub where_: String,
    pub when: String,
    pub impacts: String,
    pub health_information: String,
}

const WHAT: &str = "\n\nWHAT...";
const WHERE: &str = "\n\nWHERE...";
const WHEN: &str = "\n\nWHEN...";
const IMPACTS: &str = "\n\nIMPACTS...";
const HEALTH: &str = "\n\nHEALTH INFORMATION...";

const MARKERS: [&str; 5] = [WHAT, WHERE, WHEN, IMPACTS, HEALTH];

/// Text between `marker` and the next section marker (or the end).
fn section(text: &str, marker: &str) -> String {
    let Some(start) = text.find(marker).map(|i| i + marker.len()) else {
        return String::new();
    };
    let rest = &text[start..];
    let end = MARKERS
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    flatten(&rest[..end])
}

fn flatten(text: &str) -> String {
    text.replace('\n', " ").trim().to_string()
}

/// Split an NWS narrative into issuer, WHAT, WHERE, WHEN, IMPACTS and
/// HEALTH INFORMATION. Missing sections are empty strings; newlines inside a
/// section become spaces.
///
/// # Example
/// ```
/// use outdoor_atlas::parse_alert_description;
///
/// let text = "Colorado Department of Public Health...\n\nWHAT...Ozone\n\nWHERE...Denver";
/// let parsed = parse_alert_description(text);
/// assert_eq!(parsed.issuer, "Colorado Department of Public Health");
/// assert_eq!(parsed.what, "Ozone");
/// assert_eq!(parsed.where_, "Denver");
/// assert!(parsed.when.is_empty());
/// ```
pub fn parse_alert_description(text: &str) -> AlertDescription {
    let issuer = match text.find("...") {
        Some(end) => flatten(&text[..end]),
        None => String::new(),
    };

    AlertDescription {
        issuer,
        what: section(text, WHAT),
        where_: section(text, WHERE),
        when: section(text, WHEN),
        impacts: section(text, IMPACTS),
        health_information: section(text, HEALTH),
    }
}

const AIR_QUALITY_EVENTS: [&str; 4] = ["air quality", "smoke", "dust", "air stagnation"];

/// Whether an alert is about air quality at all.
pub fn is_air_quality_alert(alert: &WeatherAlert) -> bool {
    let event = alert.event.to_lowercase();
    AIR_QUALITY_EVENTS.iter().any(|e| event.contains(e))
}

/// Alert level for a single alert, `None` for events unrelated to air quality.
///
/// Smoke or dust in the event, headline or WHAT section maps to `SmokeDust`;
/// ozone or particulates map to `OzonePm`; both map to `Multiple`. A generic
/// air-quality alert without either keyword is treated as `OzonePm`.
pub fn alert_level_for(alert: &WeatherAlert) -> Option<AlertLevel> {
    if !is_air_quality_alert(alert) {
        return None;
    }

    let what = parse_alert_description(&alert.description).what;
    let text = format!(
        "{} {} {}",
        alert.event,
        alert.headline.as_deref().unwrap_or_default(),
        what
    )
    .to_lowercase();

    let smoke = text.contains("smoke") || text.contains("dust");
    let ozone = text.contains("ozone")
        || text.contains("particulate")
        || text.contains("pm2.5")
        || text.contains("pm 2.5");

    let level = match (smoke, ozone) {
        (true, true) => AlertLevel::Multiple,
        (true, false) => AlertLevel::SmokeDust,
        _ => AlertLevel::OzonePm,
    };
    Some(level)
}

fn normalize_county(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_suffix(" county")
        .map(str::to_string)
        .unwrap_or(lower)
}

/// Whether `alert` covers `county`.
///
/// Matches either by name against the semicolon separated `areaDesc`
/// (case-insensitive, a trailing "County" is ignored) or by FIPS code when
/// the county id is the five-digit state+county FIPS and appears at the end
/// of one of the SAME codes.
pub fn alert_covers_county(alert: &WeatherAlert, county: &PolygonFeature) -> bool {
    let name = normalize_county(&county.name);
    if !name.is_empty()
        && alert
            .area_desc
            .split(';')
            .any(|area| normalize_county(area) == name)
    {
        return true;
    }

    let fips = county.id.trim();
    fips.len() == 5
        && fips.chars().all(|c| c.is_ascii_digit())
        && alert.geocode.same.iter().any(|code| code.ends_with(fips))
}

/// Air-quality alerts active in `county`.
pub fn alerts_for_county<'a>(
    county: &PolygonFeature,
    alerts: &'a [WeatherAlert],
) -> Vec<&'a WeatherAlert> {
    alerts
        .iter()
        .filter(|alert| is_air_quality_alert(alert) && alert_covers_county(alert, county))
        .collect()
}

/// Tag every county with its combined alert level.
///
/// County order is preserved so first-match classification stays
/// deterministic. Counties with no air-quality alert get `None`.
pub fn build_alert_zones(
    counties: &[PolygonFeature],
    alerts: &[WeatherAlert],
) -> Vec<PolygonFeature> {
    let zones: Vec<PolygonFeature> = counties
        .iter()
        .map(|county| {
            let level = AlertLevel::combine(
                alerts_for_county(county, alerts)
                    .into_iter()
                    .filter_map(alert_level_for),
            );
            PolygonFeature::new(county.id.clone(), county.geometry.clone(), Category::Alert(level))
                .with_name(county.name.clone())
        })
        .collect();

    let alerted = zones
        .iter()
        .filter(|z| z.category != Category::Alert(AlertLevel::None))
        .count();
    debug!(
        "[Alerts] {} of {} counties under an air-quality alert",
        alerted,
        zones.len()
    );

    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    const DESCRIPTION: &str = "The Colorado Department of Public Health and Environment...\n\n\
WHAT...Ozone Action Day Alert.\n\n\
WHERE...Douglas, Jefferson,\nDenver, Adams.\n\n\
WHEN...4 PM Monday to 4 PM Tuesday.\n\n\
IMPACTS...Ozone may reach levels\nunhealthy for sensitive groups.\n\n\
HEALTH INFORMATION...Limit outdoor activity.";

    fn county(id: &str, name: &str, x: f64) -> PolygonFeature {
        PolygonFeature::new(
            id,
            MultiPolygon::new(vec![polygon![
                (x: x, y: 39.0),
                (x: x + 0.5, y: 39.0),
                (x: x + 0.5, y: 39.5),
                (x: x, y: 39.5),
                (x: x, y: 39.0),
            ]]),
            Category::Alert(AlertLevel::None),
        )
        .with_name(name)
    }

    fn alert(event: &str, headline: &str, area_desc: &str, same: &[&str]) -> WeatherAlert {
        WeatherAlert {
            id: format!("urn:{}", event),
            event: event.to_string(),
            headline: Some(headline.to_string()),
            area_desc: area_desc.to_string(),
            geocode: Geocode {
                same: same.iter().map(|s| s.to_string()).collect(),
                ugc: vec![],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_description_sections() {
        let parsed = parse_alert_description(DESCRIPTION);
        assert_eq!(parsed.issuer, "The Colorado Department of Public Health and Environment");
        assert_eq!(parsed.what, "Ozone Action Day Alert.");
        assert_eq!(parsed.where_, "Douglas, Jefferson, Denver, Adams.");
        assert_eq!(parsed.when, "4 PM Monday to 4 PM Tuesday.");
        assert_eq!(parsed.impacts, "Ozone may reach levels unhealthy for sensitive groups.");
        assert_eq!(parsed.health_information, "Limit outdoor activity.");
    }

    #[test]
    fn test_parse_description_without_sections() {
        let parsed = parse_alert_description("Plain text only");
        assert!(parsed.issuer.is_empty());
        assert!(parsed.what.is_empty());
        assert!(parsed.health_information.is_empty());
    }

    #[test]
    fn test_alert_levels() {
        let smoke = alert("Air Quality Alert", "Action Day for Wildfire Smoke", "", &[]);
        let ozone = alert("Air Quality Alert", "Ozone Action Day", "", &[]);
        let both = alert("Air Quality Alert", "Smoke and Ozone Action Day", "", &[]);
        let dust = alert("Blowing Dust Advisory", "", "", &[]);
        let wind = alert("High Wind Warning", "Smoke possible", "", &[]);

        assert_eq!(alert_level_for(&smoke), Some(AlertLevel::SmokeDust));
        assert_eq!(alert_level_for(&ozone), Some(AlertLevel::OzonePm));
        assert_eq!(alert_level_for(&both), Some(AlertLevel::Multiple));
        assert_eq!(alert_level_for(&dust), Some(AlertLevel::SmokeDust));
        assert_eq!(alert_level_for(&wind), None);
    }

    #[test]
    fn test_county_matching() {
        let denver = &county("08031", "Denver", -105.0);
        let by_name = alert("Air Quality Alert", "", "Adams; DENVER County; Douglas", &[]);
        let by_fips = alert("Air Quality Alert", "", "Front Range", &["008031"]);
        let other = alert("Air Quality Alert", "", "Mesa; Delta", &["008077"]);
        assert!(alert_covers_county(&by_name, denver));
        assert!(alert_covers_county(&by_fips, denver));
        assert!(!alert_covers_county(&other, denver));
    }

    #[test]
    fn test_build_alert_zones() {
        let counties = vec![
            county("08031", "Denver", -105.0),
            county("08059", "Jefferson", -105.5),
            county("08077", "Mesa", -108.5),
        ];
        let alerts = vec![
            alert("Air Quality Alert", "Ozone Action Day", "Denver; Jefferson", &[]),
            alert("Air Quality Alert", "Wildfire Smoke", "Jefferson", &[]),
            alert("Winter Storm Warning", "Snow", "Mesa", &[]),
        ];
        let zones = build_alert_zones(&counties, &alerts);

        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].category, Category::Alert(AlertLevel::OzonePm));
        assert_eq!(zones[1].category, Category::Alert(AlertLevel::Multiple));
        assert_eq!(zones[2].category, Category::Alert(AlertLevel::None));
        assert_eq!(zones[2].style_color, "#00E400");
        assert_eq!(zones[1].name, "Jefferson");
    }

    #[test]
    fn test_parse_alert_collection() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": null,
                "properties": {
                    "id": "urn:oid:1",
                    "event": "Air Quality Alert",
                    "headline": "Ozone Action Day",
                    "description": "CDPHE...\n\nWHAT...Ozone",
                    "areaDesc": "Denver; Adams",
                    "severity": "Unknown",
                    "geocode": {"SAME": ["008031", "008001"], "UGC": ["COZ040"]}
                }
            }]
        }"#;
        let alerts = parse_alerts(json).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].area_desc, "Denver; Adams");
        assert_eq!(alerts[0].geocode.same.len(), 2);
        assert_eq!(alert_level_for(&alerts[0]), Some(AlertLevel::OzonePm));
    }
}
