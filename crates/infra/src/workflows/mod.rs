//! Transactional workflows over the facility store.
//!
//! Each operation opens one transaction, validates with the domain rules in
//! `facilities-assets`, writes, and commits. Any error after `begin` rolls the
//! transaction back before it is returned.

use std::fmt::Display;
use std::sync::Arc;

use thiserror::Error;

use facilities_assets::Frequency;
use facilities_core::{DomainError, ItemId};

use crate::store::{FacilityStore, FacilityTx, StoreError};

pub mod components;
pub mod decommission;
pub mod inventory;
pub mod maintenance;

pub use decommission::{DecommissionError, DecommissionOutcome, DecommissionRequest, Replacement};

/// Error returned by the component, maintenance and inventory workflows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("no stock available for item {0}")]
    InsufficientStock(ItemId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Entry point for every facility operation.
///
/// Holds the injected store handle; cheap to clone.
#[derive(Clone)]
pub struct FacilityService {
    store: Arc<dyn FacilityStore>,
    default_frequency: Frequency,
}

impl FacilityService {
    pub fn new(store: Arc<dyn FacilityStore>, default_frequency: Frequency) -> Self {
        Self {
            store,
            default_frequency,
        }
    }

    pub fn default_frequency(&self) -> Frequency {
        self.default_frequency
    }

    pub(crate) async fn begin(&self) -> Result<Box<dyn FacilityTx>, StoreError> {
        self.store.begin().await
    }
}

/// Commit `tx` when `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish<T, E>(
    tx: Box<dyn FacilityTx>,
    operation: &'static str,
    result: Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError> + Display,
{
    match result {
        Ok(value) => {
            tx.commit().await.map_err(E::from)?;
            Ok(value)
        }
        Err(err) => Err(abort(tx, operation, err).await),
    }
}

/// Roll back `tx` and hand back the error that caused it.
///
/// A failing rollback is logged; the original error still wins.
pub(crate) async fn abort<E: Display>(tx: Box<dyn FacilityTx>, operation: &'static str, err: E) -> E {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::error!(
            kind = "rollback_failure",
            operation,
            error = %rollback_err,
            original_error = %err,
            "transaction rollback failed"
        );
    }
    err
}
