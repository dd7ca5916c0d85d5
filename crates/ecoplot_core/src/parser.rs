//! crates/ecoplot_core/src/parser.rs
//!
//! Recovers structured recommendations from free-form model output.
//!
//! Models tend to wrap their JSON in markdown fences or add commentary around it,
//! so the payload is taken as everything from the first `{` to the last `}`
//! before decoding. Missing top-level fields fall back to empty collections and 0.

use crate::domain::{DeviceRecommendation, Recommendations};
use crate::error::RecommendationError;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const TOP_LEVEL_KEYS: [&str; 6] = [
    "overall_recommendations",
    "device_recommendations",
    "schedule_optimization",
    "energy_saving_tips",
    "estimated_monthly_savings",
    "carbon_reduction_potential",
];

/// Slices the outermost `{ ... }` span out of `text`, if there is one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses the model's raw answer into [`Recommendations`].
pub fn parse_recommendations(response_text: &str) -> Result<Recommendations, RecommendationError> {
    let json_text = extract_json_object(response_text).ok_or(RecommendationError::NoJsonFound)?;

    let malformed = |e: serde_json::Error| {
        warn!("Could not decode recommendation JSON: {}", e);
        RecommendationError::Malformed {
            message: e.to_string(),
            raw_response: response_text.to_string(),
        }
    };

    let value: serde_json::Value = serde_json::from_str(json_text).map_err(malformed)?;

    if let Some(object) = value.as_object() {
        let missing: Vec<&str> = TOP_LEVEL_KEYS
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            debug!("Recommendation response omitted {:?}; using defaults", missing);
        }
    }

    serde_json::from_value(value).map_err(malformed)
}

//=========================================================================================
// Lenient field decoders
//=========================================================================================

/// Reads a number, a numeric string, or `null` (as 0).
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberLike {
        Number(f64),
        Text(String),
        Null(()),
    }

    match NumberLike::deserialize(deserializer)? {
        NumberLike::Number(n) => Ok(n),
        NumberLike::Text(s) => s
            .trim()
            .trim_start_matches('$')
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, found \"{}\"", s))),
        NumberLike::Null(()) => Ok(0.0),
    }
}

/// Reads the per-device mapping. An empty list is accepted as an empty mapping.
pub(crate) fn device_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, DeviceRecommendation>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(BTreeMap<String, DeviceRecommendation>),
        List(Vec<serde_json::Value>),
    }

    match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => Ok(map),
        MapOrList::List(items) if items.is_empty() => Ok(BTreeMap::new()),
        MapOrList::List(_) => Err(de::Error::custom(
            "device_recommendations must be an object keyed by device id",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "overall_recommendations": ["Shift laundry to off-peak hours"],
        "device_recommendations": {
            "7": {"name": "Pool Pump", "recommendation": "Run at midday", "estimated_savings": 12.5}
        },
        "schedule_optimization": ["Pool pump 11:00-15:00"],
        "energy_saving_tips": ["Lower the water heater to 50C"],
        "estimated_monthly_savings": 45.8,
        "carbon_reduction_potential": 32.5
    }"#;

    #[test]
    fn extracts_from_fenced_block_with_prose() {
        let text = format!(
            "Sure! Here is your plan:\n```json\n{}\n```\nLet me know if you need more.",
            FULL
        );
        let recs = parse_recommendations(&text).unwrap();

        assert_eq!(recs.overall_recommendations, vec!["Shift laundry to off-peak hours"]);
        assert_eq!(recs.schedule_optimization, vec!["Pool pump 11:00-15:00"]);
        assert_eq!(recs.energy_saving_tips, vec!["Lower the water heater to 50C"]);
        assert_eq!(recs.estimated_monthly_savings, 45.8);
        assert_eq!(recs.carbon_reduction_potential, 32.5);

        let pump = &recs.device_recommendations["7"];
        assert_eq!(pump.name, "Pool Pump");
        assert_eq!(pump.recommendation, "Run at midday");
        assert_eq!(pump.estimated_savings, 12.5);
    }

    #[test]
    fn parsed_payload_matches_embedded_json() {
        let recs = parse_recommendations(&format!("prefix {} suffix", FULL)).unwrap();
        let embedded: serde_json::Value = serde_json::from_str(FULL).unwrap();
        assert_eq!(serde_json::to_value(&recs).unwrap(), embedded);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let recs = parse_recommendations(r#"{"overall_recommendations": ["a"]}"#).unwrap();

        assert_eq!(recs.overall_recommendations, vec!["a"]);
        assert!(recs.device_recommendations.is_empty());
        assert!(recs.schedule_optimization.is_empty());
        assert!(recs.energy_saving_tips.is_empty());
        assert_eq!(recs.estimated_monthly_savings, 0.0);
        assert_eq!(recs.carbon_reduction_potential, 0.0);
    }

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(parse_recommendations("{}").unwrap(), Recommendations::default());
    }

    #[test]
    fn no_braces_is_no_json_found() {
        let err = parse_recommendations("I could not come up with anything.").unwrap_err();
        assert_eq!(err, RecommendationError::NoJsonFound);
        assert!(err.to_string().contains("No valid JSON structure found"));
        assert_eq!(err.raw_response(), None);
    }

    #[test]
    fn open_brace_without_closing_is_no_json_found() {
        let err = parse_recommendations("} trailing then { opening").unwrap_err();
        assert_eq!(err, RecommendationError::NoJsonFound);
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let raw = "Here you go: { malformed json ] and that's it }";
        let err = parse_recommendations(raw).unwrap_err();

        assert!(matches!(err, RecommendationError::Malformed { .. }));
        assert!(err.to_string().starts_with("Could not parse recommendations"));
        assert_eq!(err.raw_response(), Some(raw));
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        let raw = r#"{"overall_recommendations": "just one string"}"#;
        let err = parse_recommendations(raw).unwrap_err();
        assert_eq!(err.raw_response(), Some(raw));
    }

    #[test]
    fn lenient_numbers_and_empty_device_list() {
        let raw = r#"{
            "device_recommendations": [],
            "estimated_monthly_savings": "$12.40",
            "carbon_reduction_potential": null
        }"#;
        let recs = parse_recommendations(raw).unwrap();

        assert!(recs.device_recommendations.is_empty());
        assert_eq!(recs.estimated_monthly_savings, 12.4);
        assert_eq!(recs.carbon_reduction_potential, 0.0);
    }

    #[test]
    fn device_entry_without_savings_defaults_to_zero() {
        let raw = r#"{"device_recommendations": {"3": {"name": "Fridge"}}}"#;
        let recs = parse_recommendations(raw).unwrap();
        let fridge = &recs.device_recommendations["3"];
        assert_eq!(fridge.name, "Fridge");
        assert_eq!(fridge.recommendation, "");
        assert_eq!(fridge.estimated_savings, 0.0);
    }
}
