//! crates/ecoplot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    DeviceBrand, DeviceId, DeviceSummary, DeviceType, DeviceUpdate, NewDevice, NewHistoryEntry,
    ProfileUpdate, RecommendationHistoryEntry, UserEnergyProfile,
};
use crate::error::RecommendationError;
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all store port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Creates an empty profile for `user_id` if none exists yet.
    async fn ensure_user(&self, user_id: Uuid) -> PortResult<()>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserEnergyProfile>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> PortResult<UserEnergyProfile>;
}

#[async_trait]
pub trait DeviceCatalog: Send + Sync {
    async fn list_devices(&self, user_id: Uuid) -> PortResult<Vec<DeviceSummary>>;

    /// Fetches a device only if it belongs to `user_id`.
    async fn get_device(&self, user_id: Uuid, device_id: DeviceId) -> PortResult<DeviceSummary>;

    async fn create_device(&self, user_id: Uuid, device: NewDevice) -> PortResult<DeviceSummary>;

    /// Changes an owned device; `NotFound` when it is missing or owned by someone else.
    async fn update_device(
        &self,
        user_id: Uuid,
        device_id: DeviceId,
        update: DeviceUpdate,
    ) -> PortResult<DeviceSummary>;

    async fn delete_device(&self, user_id: Uuid, device_id: DeviceId) -> PortResult<()>;

    async fn list_device_types(&self) -> PortResult<Vec<DeviceType>>;

    async fn list_brands_for_type(&self, device_type_id: i32) -> PortResult<Vec<DeviceBrand>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends an entry. Entries are never updated afterwards.
    async fn record(&self, entry: NewHistoryEntry) -> PortResult<RecommendationHistoryEntry>;

    /// The newest `limit` entries for a user, newest first.
    async fn recent_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<RecommendationHistoryEntry>>;
}

//=========================================================================================
// Generative Text Port
//=========================================================================================

#[async_trait]
pub trait RecommendationClient: Send + Sync {
    /// Fails fast when the credential or endpoint is missing.
    fn ensure_configured(&self) -> Result<(), RecommendationError>;

    /// Sends the prompt and returns the model's raw text answer.
    async fn complete(&self, prompt: &str) -> Result<String, RecommendationError>;
}
