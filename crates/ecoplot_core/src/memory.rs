//! crates/ecoplot_core/src/memory.rs
//!
//! An in-process implementation of the store ports, for local runs and tests.

use crate::domain::{
    DeviceBrand, DeviceId, DeviceSummary, DeviceType, DeviceUpdate, NewDevice, NewHistoryEntry,
    ProfileUpdate, RecommendationHistoryEntry, UserEnergyProfile,
};
use crate::ports::{DeviceCatalog, HistoryStore, PortError, PortResult, ProfileStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    profiles: HashMap<Uuid, UserEnergyProfile>,
    devices: Vec<(Uuid, DeviceSummary)>,
    next_device_id: DeviceId,
    device_types: Vec<DeviceType>,
    brands: Vec<DeviceBrand>,
    history: Vec<RecommendationHistoryEntry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device type and returns its id.
    pub fn add_device_type(&self, name: &str) -> PortResult<i32> {
        let mut inner = self.lock()?;
        let id = inner.device_types.len() as i32 + 1;
        inner.device_types.push(DeviceType {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Registers a brand under a device type and returns its id.
    pub fn add_brand(&self, device_type_id: i32, name: &str) -> PortResult<i32> {
        let mut inner = self.lock()?;
        let id = inner.brands.len() as i32 + 1;
        inner.brands.push(DeviceBrand {
            id,
            device_type_id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Stores a profile as-is, replacing any existing one for the same user.
    pub fn put_profile(&self, profile: UserEnergyProfile) -> PortResult<()> {
        self.lock()?.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    /// Stores a fully formed device summary under `user_id`, keeping its id.
    pub fn put_device(&self, user_id: Uuid, device: DeviceSummary) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.next_device_id = inner.next_device_id.max(device.id);
        inner.devices.push((user_id, device));
        Ok(())
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| PortError::Unexpected(format!("in-memory store poisoned: {}", e)))
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn ensure_user(&self, user_id: Uuid) -> PortResult<()> {
        self.lock()?
            .profiles
            .entry(user_id)
            .or_insert_with(|| UserEnergyProfile::new(user_id));
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserEnergyProfile> {
        self.lock()?
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> PortResult<UserEnergyProfile> {
        let mut inner = self.lock()?;
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        profile.apply(update);
        Ok(profile.clone())
    }
}

#[async_trait]
impl DeviceCatalog for InMemoryStore {
    async fn list_devices(&self, user_id: Uuid) -> PortResult<Vec<DeviceSummary>> {
        Ok(self
            .lock()?
            .devices
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, device)| device.clone())
            .collect())
    }

    async fn get_device(&self, user_id: Uuid, device_id: DeviceId) -> PortResult<DeviceSummary> {
        self.lock()?
            .devices
            .iter()
            .find(|(owner, device)| *owner == user_id && device.id == device_id)
            .map(|(_, device)| device.clone())
            .ok_or_else(|| {
                PortError::NotFound(format!("Device {} not found or not owned by user", device_id))
            })
    }

    async fn create_device(&self, user_id: Uuid, device: NewDevice) -> PortResult<DeviceSummary> {
        let mut inner = self.lock()?;
        let type_name = inner
            .device_types
            .iter()
            .find(|t| t.id == device.device_type_id)
            .map(|t| t.name.clone())
            .ok_or_else(|| {
                PortError::InvalidInput(format!("Unknown device type {}", device.device_type_id))
            })?;
        let brand_name = inner
            .brands
            .iter()
            .find(|b| b.id == device.brand_id && b.device_type_id == device.device_type_id)
            .map(|b| b.name.clone())
            .ok_or_else(|| {
                PortError::InvalidInput(format!(
                    "Brand {} does not belong to device type {}",
                    device.brand_id, device.device_type_id
                ))
            })?;

        inner.next_device_id += 1;
        let summary = DeviceSummary {
            id: inner.next_device_id,
            name: device.name,
            device_type_name: type_name,
            brand_name,
            power_consumption_watts: device.power_consumption_watts,
            standby_power_watts: device.standby_power_watts,
            average_usage_hours_per_day: device.average_usage_hours_per_day,
            usage_flexibility: device.usage_flexibility,
            is_schedulable: device.is_schedulable,
            is_smart_device: device.is_smart_device,
            is_ev_charger: device.is_ev_charger,
            priority_level: device.priority_level,
        };
        inner.devices.push((user_id, summary.clone()));
        Ok(summary)
    }

    async fn update_device(
        &self,
        user_id: Uuid,
        device_id: DeviceId,
        update: DeviceUpdate,
    ) -> PortResult<DeviceSummary> {
        let mut inner = self.lock()?;
        let (_, device) = inner
            .devices
            .iter_mut()
            .find(|(owner, device)| *owner == user_id && device.id == device_id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Device {} not found or not owned by user", device_id))
            })?;
        device.apply(update);
        Ok(device.clone())
    }

    async fn delete_device(&self, user_id: Uuid, device_id: DeviceId) -> PortResult<()> {
        let mut inner = self.lock()?;
        let before = inner.devices.len();
        inner
            .devices
            .retain(|(owner, device)| !(*owner == user_id && device.id == device_id));
        if inner.devices.len() == before {
            return Err(PortError::NotFound(format!(
                "Device {} not found or not owned by user",
                device_id
            )));
        }
        Ok(())
    }

    async fn list_device_types(&self) -> PortResult<Vec<DeviceType>> {
        Ok(self.lock()?.device_types.clone())
    }

    async fn list_brands_for_type(&self, device_type_id: i32) -> PortResult<Vec<DeviceBrand>> {
        Ok(self
            .lock()?
            .brands
            .iter()
            .filter(|b| b.device_type_id == device_type_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn record(&self, entry: NewHistoryEntry) -> PortResult<RecommendationHistoryEntry> {
        let saved = RecommendationHistoryEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            created_at: Utc::now(),
            estimated_monthly_savings: entry.estimated_monthly_savings,
            carbon_reduction_potential: entry.carbon_reduction_potential,
            recommendations: entry.recommendations,
            device_count: entry.device_count,
            has_solar: entry.has_solar,
            has_ev: entry.has_ev,
            has_battery: entry.has_battery,
        };
        self.lock()?.history.push(saved.clone());
        Ok(saved)
    }

    async fn recent_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<RecommendationHistoryEntry>> {
        let inner = self.lock()?;
        // Insertion order breaks ties between equal timestamps.
        let mut entries: Vec<(usize, &RecommendationHistoryEntry)> = inner
            .history
            .iter()
            .enumerate()
            .filter(|(_, e)| e.user_id == user_id)
            .collect();
        entries.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(entries
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(_, e)| e.clone())
            .collect())
    }
}
