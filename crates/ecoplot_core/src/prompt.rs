//! crates/ecoplot_core/src/prompt.rs
//!
//! Turns a profile and a device list into the text prompt sent to the model.
//! Building a prompt never fails: every absent value has a printable fallback.

use crate::domain::{DeviceSummary, UserEnergyProfile};
use std::fmt::Write;

const UNKNOWN: &str = "Unknown";

/// Environmental priority assumed when the user never set one.
pub const DEFAULT_ENVIRONMENTAL_PRIORITY: i32 = 5;

const PROMPT_TEMPLATE: &str = r#"You are an energy optimization expert for the EcoPlot application.
Your task is to analyze user data and device information to create personalized
recommendations for optimizing energy usage, reducing costs, and minimizing
environmental impact.

## User Information:
{profile}
## Devices Information:
{devices}
Based on this information, provide comprehensive energy optimization recommendations
in the following JSON format. Make sure all your recommendations are practical,
specific, and tailored to the user's situation:

```json
{
  "overall_recommendations": [
    "Install a smart energy management system",
    "Shift high-consumption activities to off-peak hours"
  ],
  "device_recommendations": {
    "<device id>": {
      "name": "Device Name",
      "recommendation": "Specific optimization advice for this device",
      "estimated_savings": 5.2
    }
  },
  "schedule_optimization": [
    "Run dishwasher after 9 PM to utilize off-peak rates"
  ],
  "energy_saving_tips": [
    "Turn off devices completely instead of leaving them on standby"
  ],
  "estimated_monthly_savings": 45.80,
  "carbon_reduction_potential": 32.5
}
```

Ensure that:
1. All recommendations are realistic and specific
2. Keys of "device_recommendations" are the actual device IDs listed above, one entry per device
3. Estimated savings are realistic and based on device power consumption
4. If the user has solar, include recommendations to align usage with solar production
5. Consider the user's electricity rate plan when suggesting scheduling
6. Only respond with valid JSON that follows the exact structure shown above
"#;

/// Builds the full recommendation prompt.
pub fn build_prompt(profile: &UserEnergyProfile, devices: &[DeviceSummary]) -> String {
    PROMPT_TEMPLATE
        .replace("{profile}", &profile_section(profile))
        .replace("{devices}", &devices_section(devices))
}

fn num(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

fn profile_section(profile: &UserEnergyProfile) -> String {
    let location = profile
        .location_label()
        .unwrap_or_else(|| UNKNOWN.to_string());

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "- Location: {}", location);
    if let (Some(lat), Some(lon)) = (profile.latitude, profile.longitude) {
        let _ = writeln!(out, "- Coordinates: {:.4}, {:.4}", lat, lon);
    }
    let _ = writeln!(out, "- Has Solar Panels: {}", profile.has_solar);
    let _ = writeln!(
        out,
        "- Solar Capacity: {} kW",
        num(profile.effective_solar_capacity_kw())
    );
    let _ = writeln!(
        out,
        "- Solar Panel Orientation: {}",
        profile.effective_solar_orientation().unwrap_or(UNKNOWN)
    );
    let _ = writeln!(out, "- Has Wind Turbine: {}", profile.has_wind_turbine);
    if profile.has_wind_turbine {
        let _ = writeln!(
            out,
            "- Wind Turbine Capacity: {} kW",
            num(profile.effective_wind_capacity_kw())
        );
    }
    let _ = writeln!(out, "- Has Battery Storage: {}", profile.has_battery_storage);
    let _ = writeln!(
        out,
        "- Battery Capacity: {} kWh",
        num(profile.effective_battery_capacity_kwh())
    );
    let _ = writeln!(out, "- Has Electric Vehicle: {}", profile.has_ev);
    if profile.has_ev {
        let _ = writeln!(
            out,
            "- EV Battery Capacity: {} kWh",
            num(profile.effective_ev_battery_capacity_kwh())
        );
        let _ = writeln!(
            out,
            "- EV Typical Daily Usage: {} kWh",
            num(profile.effective_ev_daily_usage_kwh())
        );
    }
    let _ = writeln!(
        out,
        "- Electricity Rate Plan: {}",
        profile.electricity_rate_plan.as_deref().unwrap_or(UNKNOWN)
    );
    let _ = writeln!(out, "- Peak Rate: ${}/kWh", num(profile.peak_rate_per_kwh));
    let _ = writeln!(
        out,
        "- Off-peak Rate: ${}/kWh",
        num(profile.off_peak_rate_per_kwh)
    );
    let _ = writeln!(
        out,
        "- Energy Savings Goal: {}%",
        num(profile.energy_savings_goal)
    );
    let _ = writeln!(
        out,
        "- Environmental Priority: {}/10",
        profile
            .environmental_priority
            .unwrap_or(DEFAULT_ENVIRONMENTAL_PRIORITY)
    );
    out
}

fn devices_section(devices: &[DeviceSummary]) -> String {
    let mut out = String::new();
    for device in devices {
        let _ = writeln!(out, "- {} ({}):", device.name, device.device_type_name);
        let _ = writeln!(out, "  - ID: {}", device.id);
        let _ = writeln!(out, "  - Brand: {}", device.brand_name);
        let _ = writeln!(
            out,
            "  - Power Consumption: {}W",
            device.power_consumption_watts
        );
        if let Some(standby) = device.standby_power_watts {
            let _ = writeln!(out, "  - Standby Power: {}W", standby);
        }
        if let Some(hours) = device.average_usage_hours_per_day {
            let _ = writeln!(out, "  - Average Daily Usage: {} hours/day", hours);
        }
        if let Some(flexibility) = device.usage_flexibility {
            let _ = writeln!(out, "  - Usage Flexibility: {}/10", flexibility);
        }
        if let Some(priority) = device.priority_level {
            let _ = writeln!(out, "  - Priority: {}/10", priority);
        }

        let features: Vec<&str> = [
            (device.is_schedulable, "Schedulable"),
            (device.is_smart_device, "Smart Device"),
            (device.is_ev_charger, "EV Charger"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect();
        if !features.is_empty() {
            let _ = writeln!(out, "  - Features: {}", features.join(", "));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn device(id: i64, name: &str) -> DeviceSummary {
        DeviceSummary {
            id,
            name: name.to_string(),
            device_type_name: "Appliance".to_string(),
            brand_name: "Generic".to_string(),
            power_consumption_watts: 1100.0,
            standby_power_watts: None,
            average_usage_hours_per_day: None,
            usage_flexibility: None,
            is_schedulable: false,
            is_smart_device: false,
            is_ev_charger: false,
            priority_level: None,
        }
    }

    #[test]
    fn empty_profile_uses_fallbacks() {
        let prompt = build_prompt(&UserEnergyProfile::new(Uuid::new_v4()), &[]);

        assert!(prompt.contains("- Location: Unknown"));
        assert!(prompt.contains("- Has Solar Panels: false"));
        assert!(prompt.contains("- Solar Capacity: 0 kW"));
        assert!(prompt.contains("- Battery Capacity: 0 kWh"));
        assert!(prompt.contains("- Electricity Rate Plan: Unknown"));
        assert!(prompt.contains("- Peak Rate: $0/kWh"));
        assert!(prompt.contains("- Environmental Priority: 5/10"));
    }

    #[test]
    fn every_device_id_is_listed_once() {
        let devices = vec![device(7, "Pool Pump"), device(17, "Dryer"), device(3, "Fridge")];
        let prompt = build_prompt(&UserEnergyProfile::new(Uuid::new_v4()), &devices);

        for d in &devices {
            let line = format!("  - ID: {}\n", d.id);
            assert_eq!(prompt.matches(&line).count(), 1, "device {}", d.id);
            assert!(prompt.contains(&format!("- {} (Appliance):", d.name)));
        }
    }

    #[test]
    fn optional_device_attributes_are_printed_when_present() {
        let mut charger = device(4, "Garage Charger");
        charger.standby_power_watts = Some(2.5);
        charger.average_usage_hours_per_day = Some(3.0);
        charger.usage_flexibility = Some(9);
        charger.is_schedulable = true;
        charger.is_ev_charger = true;

        let prompt = build_prompt(&UserEnergyProfile::new(Uuid::new_v4()), &[charger]);

        assert!(prompt.contains("  - Standby Power: 2.5W"));
        assert!(prompt.contains("  - Average Daily Usage: 3 hours/day"));
        assert!(prompt.contains("  - Usage Flexibility: 9/10"));
        assert!(prompt.contains("  - Features: Schedulable, EV Charger"));
        assert!(!prompt.contains("  - Priority:"));
    }

    #[test]
    fn capabilities_without_flag_read_as_absent() {
        let mut profile = UserEnergyProfile::new(Uuid::new_v4());
        profile.solar_capacity_kw = Some(8.0);
        profile.solar_panel_orientation = Some("south".into());
        profile.battery_capacity_kwh = Some(10.0);

        let prompt = build_prompt(&profile, &[]);
        assert!(prompt.contains("- Solar Capacity: 0 kW"));
        assert!(prompt.contains("- Solar Panel Orientation: Unknown"));
        assert!(prompt.contains("- Battery Capacity: 0 kWh"));

        profile.has_solar = true;
        let prompt = build_prompt(&profile, &[]);
        assert!(prompt.contains("- Solar Capacity: 8 kW"));
        assert!(prompt.contains("- Solar Panel Orientation: south"));
    }

    #[test]
    fn prompt_asks_for_the_json_schema() {
        let prompt = build_prompt(&UserEnergyProfile::new(Uuid::new_v4()), &[device(1, "TV")]);
        for key in [
            "\"overall_recommendations\"",
            "\"device_recommendations\"",
            "\"schedule_optimization\"",
            "\"energy_saving_tips\"",
            "\"estimated_monthly_savings\"",
            "\"carbon_reduction_potential\"",
        ] {
            assert!(prompt.contains(key), "missing {}", key);
        }
        assert!(prompt.contains("actual device IDs"));
    }
}
