pub mod domain;
pub mod error;
pub mod memory;
pub mod parser;
pub mod pipeline;
pub mod ports;
pub mod prompt;

pub use domain::{
    DeviceBrand, DeviceId, DeviceRecommendation, DeviceSummary, DeviceType, DeviceUpdate,
    NewDevice, NewHistoryEntry, ProfileUpdate, RecommendationHistoryEntry, RecommendationReport,
    RecommendationResult, Recommendations, UserEnergyProfile,
};
pub use error::RecommendationError;
pub use pipeline::RecommendationPipeline;
pub use ports::{
    DeviceCatalog, HistoryStore, PortError, PortResult, ProfileStore, RecommendationClient,
};
