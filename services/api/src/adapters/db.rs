//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileStore`, `DeviceCatalog` and `HistoryStore` ports from the `core`
//! crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecoplot_core::domain::{
    DeviceBrand, DeviceId, DeviceSummary, DeviceType, DeviceUpdate, NewDevice, NewHistoryEntry,
    ProfileUpdate, RecommendationHistoryEntry, UserEnergyProfile,
};
use ecoplot_core::ports::{DeviceCatalog, HistoryStore, PortError, PortResult, ProfileStore};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Builds the SET clause of a single-statement partial update, numbering
/// placeholders from `first_param`.
///
/// Each `nullable` column takes two parameters, a "present" flag and the new
/// value (which may be NULL). Each `keep_if_null` column takes one parameter
/// and keeps its stored value when that parameter is NULL. Bind in that order.
fn partial_update_set(first_param: usize, nullable: &[&str], keep_if_null: &[&str]) -> String {
    let mut sets: Vec<String> = nullable
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let flag = first_param + 2 * i;
            format!("{col} = CASE WHEN ${} THEN ${} ELSE {col} END", flag, flag + 1)
        })
        .collect();
    let next = first_param + 2 * nullable.len();
    sets.extend(
        keep_if_null
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = COALESCE(${}, {col})", next + i)),
    );
    sets.join(", ")
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PROFILE_COLUMNS: &str = "user_id, city, state, country, latitude, longitude, \
    has_solar, solar_capacity_kw, solar_panel_orientation, solar_panel_tilt, \
    has_wind_turbine, wind_turbine_capacity_kw, \
    has_ev, ev_battery_capacity_kwh, ev_typical_daily_usage_kwh, \
    has_battery_storage, battery_capacity_kwh, \
    electricity_rate_plan, peak_rate_per_kwh, off_peak_rate_per_kwh, \
    energy_savings_goal, environmental_priority";

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    has_solar: bool,
    solar_capacity_kw: Option<f64>,
    solar_panel_orientation: Option<String>,
    solar_panel_tilt: Option<f64>,
    has_wind_turbine: bool,
    wind_turbine_capacity_kw: Option<f64>,
    has_ev: bool,
    ev_battery_capacity_kwh: Option<f64>,
    ev_typical_daily_usage_kwh: Option<f64>,
    has_battery_storage: bool,
    battery_capacity_kwh: Option<f64>,
    electricity_rate_plan: Option<String>,
    peak_rate_per_kwh: Option<f64>,
    off_peak_rate_per_kwh: Option<f64>,
    energy_savings_goal: Option<f64>,
    environmental_priority: Option<i32>,
}
impl ProfileRecord {
    fn to_domain(self) -> UserEnergyProfile {
        UserEnergyProfile {
            user_id: self.user_id,
            city: self.city,
            state: self.state,
            country: self.country,
            latitude: self.latitude,
            longitude: self.longitude,
            has_solar: self.has_solar,
            solar_capacity_kw: self.solar_capacity_kw,
            solar_panel_orientation: self.solar_panel_orientation,
            solar_panel_tilt: self.solar_panel_tilt,
            has_wind_turbine: self.has_wind_turbine,
            wind_turbine_capacity_kw: self.wind_turbine_capacity_kw,
            has_ev: self.has_ev,
            ev_battery_capacity_kwh: self.ev_battery_capacity_kwh,
            ev_typical_daily_usage_kwh: self.ev_typical_daily_usage_kwh,
            has_battery_storage: self.has_battery_storage,
            battery_capacity_kwh: self.battery_capacity_kwh,
            electricity_rate_plan: self.electricity_rate_plan,
            peak_rate_per_kwh: self.peak_rate_per_kwh,
            off_peak_rate_per_kwh: self.off_peak_rate_per_kwh,
            energy_savings_goal: self.energy_savings_goal,
            environmental_priority: self.environmental_priority,
        }
    }
}

const DEVICE_SELECT: &str = "SELECT d.id, d.name, t.name AS device_type_name, b.name AS brand_name, \
    d.power_consumption_watts, d.standby_power_watts, d.average_usage_hours_per_day, \
    d.usage_flexibility, d.is_schedulable, d.is_smart_device, d.is_ev_charger, d.priority_level \
    FROM devices d \
    JOIN device_types t ON d.device_type_id = t.id \
    JOIN device_brands b ON d.brand_id = b.id";

#[derive(FromRow)]
struct DeviceRecord {
    id: i64,
    name: String,
    device_type_name: String,
    brand_name: String,
    power_consumption_watts: f64,
    standby_power_watts: Option<f64>,
    average_usage_hours_per_day: Option<f64>,
    usage_flexibility: Option<i32>,
    is_schedulable: bool,
    is_smart_device: bool,
    is_ev_charger: bool,
    priority_level: Option<i32>,
}
impl DeviceRecord {
    fn to_domain(self) -> DeviceSummary {
        DeviceSummary {
            id: self.id,
            name: self.name,
            device_type_name: self.device_type_name,
            brand_name: self.brand_name,
            power_consumption_watts: self.power_consumption_watts,
            standby_power_watts: self.standby_power_watts,
            average_usage_hours_per_day: self.average_usage_hours_per_day,
            usage_flexibility: self.usage_flexibility,
            is_schedulable: self.is_schedulable,
            is_smart_device: self.is_smart_device,
            is_ev_charger: self.is_ev_charger,
            priority_level: self.priority_level,
        }
    }
}

#[derive(FromRow)]
struct DeviceTypeRecord {
    id: i32,
    name: String,
}

#[derive(FromRow)]
struct DeviceBrandRecord {
    id: i32,
    device_type_id: i32,
    name: String,
}

#[derive(FromRow)]
struct HistoryRecord {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    estimated_monthly_savings: f64,
    carbon_reduction_potential: f64,
    recommendations_json: Json<serde_json::Value>,
    device_count: i32,
    has_solar: bool,
    has_ev: bool,
    has_battery: bool,
}
impl HistoryRecord {
    fn to_domain(self) -> RecommendationHistoryEntry {
        RecommendationHistoryEntry {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at,
            estimated_monthly_savings: self.estimated_monthly_savings,
            carbon_reduction_potential: self.carbon_reduction_potential,
            recommendations: self.recommendations_json.0,
            device_count: self.device_count,
            has_solar: self.has_solar,
            has_ev: self.has_ev,
            has_battery: self.has_battery,
        }
    }
}

const HISTORY_COLUMNS: &str = "id, user_id, created_at, estimated_monthly_savings, \
    carbon_reduction_potential, recommendations_json, device_count, has_solar, has_ev, has_battery";

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn ensure_user(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserEnergyProfile> {
        let sql = format!("SELECT {} FROM users WHERE user_id = $1", PROFILE_COLUMNS);
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> PortResult<UserEnergyProfile> {
        // One statement, so concurrent updates to different fields both land.
        let sql = format!(
            "UPDATE users SET {}, updated_at = NOW() WHERE user_id = $1 RETURNING {}",
            partial_update_set(
                2,
                &[
                    "city",
                    "state",
                    "country",
                    "latitude",
                    "longitude",
                    "solar_capacity_kw",
                    "solar_panel_orientation",
                    "solar_panel_tilt",
                    "wind_turbine_capacity_kw",
                    "ev_battery_capacity_kwh",
                    "ev_typical_daily_usage_kwh",
                    "battery_capacity_kwh",
                    "electricity_rate_plan",
                    "peak_rate_per_kwh",
                    "off_peak_rate_per_kwh",
                    "energy_savings_goal",
                    "environmental_priority",
                ],
                &["has_solar", "has_wind_turbine", "has_ev", "has_battery_storage"],
            ),
            PROFILE_COLUMNS
        );

        macro_rules! bind_nullable {
            ($query:expr, $($field:ident),* $(,)?) => {
                $query$(.bind(update.$field.is_some()).bind(update.$field.flatten()))*
            };
        }

        let query = sqlx::query_as::<_, ProfileRecord>(&sql).bind(user_id);
        let query = bind_nullable!(
            query,
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
        );
        let record = query
            .bind(update.has_solar)
            .bind(update.has_wind_turbine)
            .bind(update.has_ev)
            .bind(update.has_battery_storage)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `DeviceCatalog` Trait Implementation
//=========================================================================================

#[async_trait]
impl DeviceCatalog for DbAdapter {
    async fn list_devices(&self, user_id: Uuid) -> PortResult<Vec<DeviceSummary>> {
        let sql = format!("{} WHERE d.user_id = $1 ORDER BY d.id ASC", DEVICE_SELECT);
        let records = sqlx::query_as::<_, DeviceRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_device(&self, user_id: Uuid, device_id: DeviceId) -> PortResult<DeviceSummary> {
        let sql = format!("{} WHERE d.id = $1 AND d.user_id = $2", DEVICE_SELECT);
        let record = sqlx::query_as::<_, DeviceRecord>(&sql)
            .bind(device_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!(
                "Device {} not found or not owned by user",
                device_id
            )))?;
        Ok(record.to_domain())
    }

    async fn create_device(&self, user_id: Uuid, device: NewDevice) -> PortResult<DeviceSummary> {
        let brand_matches_type: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM device_brands WHERE id = $1 AND device_type_id = $2")
                .bind(device.brand_id)
                .bind(device.device_type_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        if brand_matches_type.is_none() {
            return Err(PortError::InvalidInput(format!(
                "Brand {} does not exist for device type {}",
                device.brand_id, device.device_type_id
            )));
        }

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO devices (user_id, device_type_id, brand_id, name, power_consumption_watts, \
                standby_power_watts, average_usage_hours_per_day, usage_flexibility, priority_level, \
                is_schedulable, is_smart_device, is_ev_charger) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id",
        )
        .bind(user_id)
        .bind(device.device_type_id)
        .bind(device.brand_id)
        .bind(&device.name)
        .bind(device.power_consumption_watts)
        .bind(device.standby_power_watts)
        .bind(device.average_usage_hours_per_day)
        .bind(device.usage_flexibility)
        .bind(device.priority_level)
        .bind(device.is_schedulable)
        .bind(device.is_smart_device)
        .bind(device.is_ev_charger)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get_device(user_id, id).await
    }

    async fn update_device(
        &self,
        user_id: Uuid,
        device_id: DeviceId,
        update: DeviceUpdate,
    ) -> PortResult<DeviceSummary> {
        let sql = format!(
            "UPDATE devices SET {} WHERE id = $1 AND user_id = $2 RETURNING id",
            partial_update_set(
                3,
                &[
                    "standby_power_watts",
                    "average_usage_hours_per_day",
                    "usage_flexibility",
                    "priority_level",
                ],
                &[
                    "name",
                    "power_consumption_watts",
                    "is_schedulable",
                    "is_smart_device",
                    "is_ev_charger",
                ],
            )
        );

        let updated: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(device_id)
            .bind(user_id)
            .bind(update.standby_power_watts.is_some())
            .bind(update.standby_power_watts.flatten())
            .bind(update.average_usage_hours_per_day.is_some())
            .bind(update.average_usage_hours_per_day.flatten())
            .bind(update.usage_flexibility.is_some())
            .bind(update.usage_flexibility.flatten())
            .bind(update.priority_level.is_some())
            .bind(update.priority_level.flatten())
            .bind(update.name)
            .bind(update.power_consumption_watts)
            .bind(update.is_schedulable)
            .bind(update.is_smart_device)
            .bind(update.is_ev_charger)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        if updated.is_none() {
            return Err(PortError::NotFound(format!(
                "Device {} not found or not owned by user",
                device_id
            )));
        }

        self.get_device(user_id, device_id).await
    }

    async fn delete_device(&self, user_id: Uuid, device_id: DeviceId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1 AND user_id = $2")
            .bind(device_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Device {} not found or not owned by user",
                device_id
            )));
        }
        Ok(())
    }

    async fn list_device_types(&self) -> PortResult<Vec<DeviceType>> {
        let records =
            sqlx::query_as::<_, DeviceTypeRecord>("SELECT id, name FROM device_types ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| DeviceType {
                id: r.id,
                name: r.name,
            })
            .collect())
    }

    async fn list_brands_for_type(&self, device_type_id: i32) -> PortResult<Vec<DeviceBrand>> {
        let records = sqlx::query_as::<_, DeviceBrandRecord>(
            "SELECT id, device_type_id, name FROM device_brands WHERE device_type_id = $1 ORDER BY name",
        )
        .bind(device_type_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| DeviceBrand {
                id: r.id,
                device_type_id: r.device_type_id,
                name: r.name,
            })
            .collect())
    }
}

//=========================================================================================
// `HistoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HistoryStore for DbAdapter {
    async fn record(&self, entry: NewHistoryEntry) -> PortResult<RecommendationHistoryEntry> {
        let sql = format!(
            "INSERT INTO recommendation_history (id, user_id, estimated_monthly_savings, \
                carbon_reduction_potential, recommendations_json, device_count, has_solar, has_ev, has_battery) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            HISTORY_COLUMNS
        );
        let record = sqlx::query_as::<_, HistoryRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.user_id)
            .bind(entry.estimated_monthly_savings)
            .bind(entry.carbon_reduction_potential)
            .bind(Json(entry.recommendations))
            .bind(entry.device_count)
            .bind(entry.has_solar)
            .bind(entry.has_ev)
            .bind(entry.has_battery)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn recent_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<RecommendationHistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM recommendation_history WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
            HISTORY_COLUMNS
        );
        let records = sqlx::query_as::<_, HistoryRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
