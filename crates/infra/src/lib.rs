//! Infrastructure layer: persistence, transactional workflows, configuration.

pub mod config;
pub mod store;
pub mod workflows;

pub use config::{AppConfig, ConfigError};
pub use store::{FacilityStore, FacilityTx, InMemoryFacilityStore, PgFacilityStore, StoreError};
pub use workflows::{
    DecommissionError, DecommissionOutcome, DecommissionRequest, FacilityService, Replacement,
    WorkflowError,
};
