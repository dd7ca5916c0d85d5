//! crates/ecoplot_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any database; the ones that cross the
//! HTTP boundary or get stored as JSON also derive serde traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type DeviceId = i64;

//=========================================================================================
// Profile
//=========================================================================================

/// A user's stored home, generation, storage and utility characteristics.
///
/// The numeric fields of a capability (solar, wind, EV, battery) only carry
/// meaning while the matching `has_*` flag is set. Use the `effective_*`
/// accessors rather than reading those fields directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEnergyProfile {
    pub user_id: Uuid,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub has_solar: bool,
    pub solar_capacity_kw: Option<f64>,
    pub solar_panel_orientation: Option<String>,
    pub solar_panel_tilt: Option<f64>,

    pub has_wind_turbine: bool,
    pub wind_turbine_capacity_kw: Option<f64>,

    pub has_ev: bool,
    pub ev_battery_capacity_kwh: Option<f64>,
    pub ev_typical_daily_usage_kwh: Option<f64>,

    pub has_battery_storage: bool,
    pub battery_capacity_kwh: Option<f64>,

    pub electricity_rate_plan: Option<String>,
    pub peak_rate_per_kwh: Option<f64>,
    pub off_peak_rate_per_kwh: Option<f64>,

    /// Target savings percentage.
    pub energy_savings_goal: Option<f64>,
    /// 1-10 scale.
    pub environmental_priority: Option<i32>,
}

impl UserEnergyProfile {
    /// An empty profile for a user who has not filled anything in yet.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// "City, State, Country" when all three are known, else the city, else `None`.
    pub fn location_label(&self) -> Option<String> {
        match (&self.city, &self.state, &self.country) {
            (Some(city), Some(state), Some(country))
                if !city.is_empty() && !state.is_empty() && !country.is_empty() =>
            {
                Some(format!("{}, {}, {}", city, state, country))
            }
            (Some(city), _, _) if !city.is_empty() => Some(city.clone()),
            _ => None,
        }
    }

    pub fn effective_solar_capacity_kw(&self) -> Option<f64> {
        self.solar_capacity_kw.filter(|_| self.has_solar)
    }

    pub fn effective_solar_orientation(&self) -> Option<&str> {
        self.solar_panel_orientation
            .as_deref()
            .filter(|_| self.has_solar)
    }

    pub fn effective_wind_capacity_kw(&self) -> Option<f64> {
        self.wind_turbine_capacity_kw.filter(|_| self.has_wind_turbine)
    }

    pub fn effective_battery_capacity_kwh(&self) -> Option<f64> {
        self.battery_capacity_kwh.filter(|_| self.has_battery_storage)
    }

    pub fn effective_ev_battery_capacity_kwh(&self) -> Option<f64> {
        self.ev_battery_capacity_kwh.filter(|_| self.has_ev)
    }

    pub fn effective_ev_daily_usage_kwh(&self) -> Option<f64> {
        self.ev_typical_daily_usage_kwh.filter(|_| self.has_ev)
    }

    /// Applies an allow-listed update. Absent keys leave a field unchanged; an
    /// explicit `null` clears an optional field.
    pub fn apply(&mut self, update: ProfileUpdate) {
        macro_rules! set_present {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = update.$field {
                    self.$field = value;
                })*
            };
        }

        set_present!(
            city,
            state,
            country,
            latitude,
            longitude,
            solar_capacity_kw,
            solar_panel_orientation,
            solar_panel_tilt,
            wind_turbine_capacity_kw,
            ev_battery_capacity_kwh,
            ev_typical_daily_usage_kwh,
            battery_capacity_kwh,
            electricity_rate_plan,
            peak_rate_per_kwh,
            off_peak_rate_per_kwh,
            energy_savings_goal,
            environmental_priority,
            has_solar,
            has_wind_turbine,
            has_ev,
            has_battery_storage,
        );
    }
}

/// Reads a key that may be absent (`None`), `null` (`Some(None)`) or set.
///
/// Pair with `#[serde(default)]` so a missing key never reaches this function.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The fields of a profile a client is allowed to change.
///
/// Unknown keys are rejected at deserialization time instead of being ignored.
/// Optional fields are doubly wrapped: the outer `None` means "not sent".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub country: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub longitude: Option<Option<f64>>,
    pub has_solar: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub solar_capacity_kw: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub solar_panel_orientation: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub solar_panel_tilt: Option<Option<f64>>,
    pub has_wind_turbine: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub wind_turbine_capacity_kw: Option<Option<f64>>,
    pub has_ev: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub ev_battery_capacity_kwh: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub ev_typical_daily_usage_kwh: Option<Option<f64>>,
    pub has_battery_storage: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub battery_capacity_kwh: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub electricity_rate_plan: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub peak_rate_per_kwh: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub off_peak_rate_per_kwh: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub energy_savings_goal: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub environmental_priority: Option<Option<i32>>,
}

//=========================================================================================
// Devices
//=========================================================================================

/// An appliance from a user's device catalog, joined with its type and brand names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub device_type_name: String,
    pub brand_name: String,
    pub power_consumption_watts: f64,
    pub standby_power_watts: Option<f64>,
    pub average_usage_hours_per_day: Option<f64>,
    /// 0 (inflexible) to 10 (very flexible).
    pub usage_flexibility: Option<i32>,
    pub is_schedulable: bool,
    pub is_smart_device: bool,
    pub is_ev_charger: bool,
    /// 1-10 optimization priority.
    pub priority_level: Option<i32>,
}

/// Payload for adding a device to a user's catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDevice {
    pub name: String,
    pub device_type_id: i32,
    pub brand_id: i32,
    pub power_consumption_watts: f64,
    #[serde(default)]
    pub standby_power_watts: Option<f64>,
    #[serde(default)]
    pub average_usage_hours_per_day: Option<f64>,
    #[serde(default)]
    pub usage_flexibility: Option<i32>,
    #[serde(default)]
    pub priority_level: Option<i32>,
    #[serde(default)]
    pub is_schedulable: bool,
    #[serde(default)]
    pub is_smart_device: bool,
    #[serde(default)]
    pub is_ev_charger: bool,
}

/// The fields of a device a client is allowed to change. Type and brand are fixed
/// at creation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub power_consumption_watts: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub standby_power_watts: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub average_usage_hours_per_day: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub usage_flexibility: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub priority_level: Option<Option<i32>>,
    pub is_schedulable: Option<bool>,
    pub is_smart_device: Option<bool>,
    pub is_ev_charger: Option<bool>,
}

impl DeviceSummary {
    /// Applies an allow-listed update with the same absent/`null` rules as profiles.
    pub fn apply(&mut self, update: DeviceUpdate) {
        macro_rules! set_present {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = update.$field {
                    self.$field = value;
                })*
            };
        }

        set_present!(
            name,
            power_consumption_watts,
            standby_power_watts,
            average_usage_hours_per_day,
            usage_flexibility,
            priority_level,
            is_schedulable,
            is_smart_device,
            is_ev_charger,
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceType {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceBrand {
    pub id: i32,
    pub device_type_id: i32,
    pub name: String,
}

//=========================================================================================
// Recommendations
//=========================================================================================

/// Per-device advice, keyed by device id in [`Recommendations::device_recommendations`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecommendation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default, deserialize_with = "crate::parser::lenient_number")]
    pub estimated_savings: f64,
}

/// The structured payload recovered from the model's answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub overall_recommendations: Vec<String>,
    #[serde(default, deserialize_with = "crate::parser::device_map")]
    pub device_recommendations: BTreeMap<String, DeviceRecommendation>,
    #[serde(default)]
    pub schedule_optimization: Vec<String>,
    #[serde(default)]
    pub energy_saving_tips: Vec<String>,
    /// Currency units per month.
    #[serde(default, deserialize_with = "crate::parser::lenient_number")]
    pub estimated_monthly_savings: f64,
    /// Mass units (kg CO2) per month.
    #[serde(default, deserialize_with = "crate::parser::lenient_number")]
    pub carbon_reduction_potential: f64,
}

/// Outcome of one generation run, in the shape returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Recommendations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl RecommendationResult {
    pub fn success(recommendations: Recommendations) -> Self {
        Self {
            success: true,
            recommendations: Some(recommendations),
            error: None,
            raw_response: None,
        }
    }

    pub fn failure(error: &crate::error::RecommendationError) -> Self {
        Self {
            success: false,
            recommendations: None,
            error: Some(error.to_string()),
            raw_response: error.raw_response().map(str::to_string),
        }
    }
}

impl From<Result<Recommendations, crate::error::RecommendationError>> for RecommendationResult {
    fn from(result: Result<Recommendations, crate::error::RecommendationError>) -> Self {
        match result {
            Ok(recommendations) => Self::success(recommendations),
            Err(e) => Self::failure(&e),
        }
    }
}

/// What the pipeline hands back to callers of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationReport {
    pub user_id: Uuid,
    pub has_solar: bool,
    pub has_ev: bool,
    pub has_battery: bool,
    pub devices_count: usize,
    /// The analysed device, for single-device runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSummary>,
    pub recommendations: RecommendationResult,
    /// Set when the run was written to history.
    pub history_id: Option<Uuid>,
}

//=========================================================================================
// History
//=========================================================================================

/// A persisted snapshot of one successful generation. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub estimated_monthly_savings: f64,
    pub carbon_reduction_potential: f64,
    pub recommendations: serde_json::Value,
    pub device_count: i32,
    pub has_solar: bool,
    pub has_ev: bool,
    pub has_battery: bool,
}

/// The insert side of a history entry; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub user_id: Uuid,
    pub estimated_monthly_savings: f64,
    pub carbon_reduction_potential: f64,
    pub recommendations: serde_json::Value,
    pub device_count: i32,
    pub has_solar: bool,
    pub has_ev: bool,
    pub has_battery: bool,
}

impl NewHistoryEntry {
    pub fn from_recommendations(
        profile: &UserEnergyProfile,
        device_count: usize,
        recommendations: &Recommendations,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            user_id: profile.user_id,
            estimated_monthly_savings: recommendations.estimated_monthly_savings,
            carbon_reduction_potential: recommendations.carbon_reduction_potential,
            recommendations: serde_json::to_value(recommendations)?,
            device_count: i32::try_from(device_count).unwrap_or(i32::MAX),
            has_solar: profile.has_solar,
            has_ev: profile.has_ev,
            has_battery: profile.has_battery_storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_label_prefers_full_address() {
        let mut profile = UserEnergyProfile::new(Uuid::new_v4());
        assert_eq!(profile.location_label(), None);

        profile.city = Some("Austin".into());
        assert_eq!(profile.location_label().as_deref(), Some("Austin"));

        profile.state = Some("TX".into());
        profile.country = Some("USA".into());
        assert_eq!(profile.location_label().as_deref(), Some("Austin, TX, USA"));
    }

    #[test]
    fn capability_fields_are_ignored_when_flag_is_off() {
        let mut profile = UserEnergyProfile::new(Uuid::new_v4());
        profile.solar_capacity_kw = Some(6.5);
        profile.battery_capacity_kwh = Some(13.5);
        profile.ev_battery_capacity_kwh = Some(75.0);

        assert_eq!(profile.effective_solar_capacity_kw(), None);
        assert_eq!(profile.effective_battery_capacity_kwh(), None);
        assert_eq!(profile.effective_ev_battery_capacity_kwh(), None);

        profile.has_solar = true;
        assert_eq!(profile.effective_solar_capacity_kw(), Some(6.5));
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut profile = UserEnergyProfile::new(Uuid::new_v4());
        profile.city = Some("Austin".into());
        profile.has_ev = true;

        profile.apply(ProfileUpdate {
            has_solar: Some(true),
            solar_capacity_kw: Some(Some(5.0)),
            ..Default::default()
        });

        assert_eq!(profile.city.as_deref(), Some("Austin"));
        assert!(profile.has_ev);
        assert!(profile.has_solar);
        assert_eq!(profile.solar_capacity_kw, Some(5.0));
    }

    #[test]
    fn null_clears_an_optional_field() {
        let mut profile = UserEnergyProfile::new(Uuid::new_v4());
        profile.electricity_rate_plan = Some("TOU-A".into());
        profile.city = Some("Austin".into());

        let update: ProfileUpdate =
            serde_json::from_str(r#"{"electricity_rate_plan": null}"#).unwrap();
        assert_eq!(update.electricity_rate_plan, Some(None));
        assert_eq!(update.city, None);

        profile.apply(update);
        assert_eq!(profile.electricity_rate_plan, None);
        assert_eq!(profile.city.as_deref(), Some("Austin"));
    }

    #[test]
    fn device_update_keeps_absent_fields() {
        let mut device = DeviceSummary {
            id: 3,
            name: "Dryer".into(),
            device_type_name: "Dryer".into(),
            brand_name: "Bosch".into(),
            power_consumption_watts: 2400.0,
            standby_power_watts: Some(1.5),
            average_usage_hours_per_day: Some(1.0),
            usage_flexibility: Some(6),
            is_schedulable: false,
            is_smart_device: false,
            is_ev_charger: false,
            priority_level: None,
        };

        let update: DeviceUpdate =
            serde_json::from_str(r#"{"standby_power_watts": null, "is_schedulable": true}"#)
                .unwrap();
        device.apply(update);

        assert_eq!(device.standby_power_watts, None);
        assert!(device.is_schedulable);
        assert_eq!(device.usage_flexibility, Some(6));
        assert_eq!(device.power_consumption_watts, 2400.0);

        let err = serde_json::from_str::<DeviceUpdate>(r#"{"user_id": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn profile_update_rejects_unknown_keys() {
        let err = serde_json::from_str::<ProfileUpdate>(r#"{"city":"Oslo","is_admin":true}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }
}
