//! crates/ecoplot_core/src/pipeline.rs
//!
//! The recommendation workflow: load profile and devices, build the prompt,
//! call the model, parse its answer, and record successful runs in history.

use crate::domain::{
    DeviceId, DeviceSummary, NewHistoryEntry, RecommendationHistoryEntry, RecommendationReport,
    RecommendationResult, Recommendations, UserEnergyProfile,
};
use crate::error::RecommendationError;
use crate::parser::parse_recommendations;
use crate::ports::{
    DeviceCatalog, HistoryStore, PortError, PortResult, ProfileStore, RecommendationClient,
};
use crate::prompt::build_prompt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 50;

/// Wires the stores and the model client together. Cheap to clone; holds no
/// per-request state, so concurrent runs for different users never interact.
#[derive(Clone)]
pub struct RecommendationPipeline {
    profiles: Arc<dyn ProfileStore>,
    devices: Arc<dyn DeviceCatalog>,
    history: Arc<dyn HistoryStore>,
    client: Arc<dyn RecommendationClient>,
    history_limit: i64,
}

impl RecommendationPipeline {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        devices: Arc<dyn DeviceCatalog>,
        history: Arc<dyn HistoryStore>,
        client: Arc<dyn RecommendationClient>,
    ) -> Self {
        Self {
            profiles,
            devices,
            history,
            client,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Overrides the page size used when `history` is called without a limit.
    pub fn with_history_limit(mut self, limit: i64) -> Self {
        self.history_limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        self
    }

    /// Generates recommendations covering every device the user owns and
    /// records a successful run in history.
    pub async fn generate_for_user(&self, user_id: Uuid) -> PortResult<RecommendationReport> {
        let profile = self.profiles.get_profile(user_id).await?;
        let devices = self.devices.list_devices(user_id).await?;
        if devices.is_empty() {
            return Err(PortError::InvalidInput(
                "No devices found. Please add at least one device to get recommendations."
                    .to_string(),
            ));
        }

        let outcome = self.run(&profile, &devices).await;
        let history_id = match &outcome {
            Ok(recommendations) => self.record(&profile, devices.len(), recommendations).await,
            Err(_) => None,
        };

        Ok(report(&profile, devices.len(), None, outcome, history_id))
    }

    /// Generates recommendations for a single owned device. These runs are not
    /// recorded in history.
    pub async fn generate_for_device(
        &self,
        user_id: Uuid,
        device_id: DeviceId,
    ) -> PortResult<RecommendationReport> {
        let profile = self.profiles.get_profile(user_id).await?;
        let device = self.devices.get_device(user_id, device_id).await?;
        let devices = [device];

        let outcome = self.run(&profile, &devices).await;
        let [device] = devices;
        Ok(report(&profile, 1, Some(device), outcome, None))
    }

    /// The user's most recent history entries, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> PortResult<Vec<RecommendationHistoryEntry>> {
        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.history.recent_for_user(user_id, limit).await
    }

    async fn run(
        &self,
        profile: &UserEnergyProfile,
        devices: &[DeviceSummary],
    ) -> Result<Recommendations, RecommendationError> {
        self.client.ensure_configured()?;

        let prompt = build_prompt(profile, devices);
        debug!(
            "Built recommendation prompt ({} chars, {} devices) for user {}",
            prompt.len(),
            devices.len(),
            profile.user_id
        );

        let response_text = self.client.complete(&prompt).await.map_err(|e| {
            warn!("Recommendation request failed for user {}: {}", profile.user_id, e);
            e
        })?;

        parse_recommendations(&response_text)
    }

    /// Best-effort: a failed write is logged and the run still succeeds.
    async fn record(
        &self,
        profile: &UserEnergyProfile,
        device_count: usize,
        recommendations: &Recommendations,
    ) -> Option<Uuid> {
        let entry = NewHistoryEntry::from_recommendations(profile, device_count, recommendations);
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Error serializing recommendation history: {}", e);
                return None;
            }
        };

        match self.history.record(entry).await {
            Ok(saved) => {
                info!("Saved recommendation history {} for user {}", saved.id, saved.user_id);
                Some(saved.id)
            }
            Err(e) => {
                error!("Error saving recommendation history: {}", e);
                None
            }
        }
    }
}

fn report(
    profile: &UserEnergyProfile,
    devices_count: usize,
    device: Option<DeviceSummary>,
    outcome: Result<Recommendations, RecommendationError>,
    history_id: Option<Uuid>,
) -> RecommendationReport {
    RecommendationReport {
        user_id: profile.user_id,
        has_solar: profile.has_solar,
        has_ev: profile.has_ev,
        has_battery: profile.has_battery_storage,
        devices_count,
        device,
        recommendations: RecommendationResult::from(outcome),
        history_id,
    }
}
