//! Semaphore utilities for the priority gates
//!
//! This module provides helper functions for managing semaphores with
//! consistent error handling across the gates.

use sempool_errors::{Error, GateError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Acquire a semaphore permit with proper error handling
///
/// Waiters are served first-come-first-served.
///
/// # Errors
///
/// Returns an error if the semaphore is closed
pub async fn acquire_semaphore_permit(
    semaphore: Arc<Semaphore>,
    resource: &str,
) -> Result<OwnedSemaphorePermit, Error> {
    semaphore.acquire_owned().await.map_err(|_| {
        GateError::Closed {
            resource: resource.to_string(),
        }
        .into()
    })
}

/// Try to acquire a semaphore permit without waiting
///
/// # Returns
///
/// Returns `Ok(Some(permit))` if successful, `Ok(None)` if would block,
/// or an error if the semaphore is closed.
///
/// # Errors
///
/// Returns an error if the semaphore is closed.
pub fn try_acquire_semaphore_permit(
    semaphore: &Arc<Semaphore>,
    resource: &str,
) -> Result<Option<OwnedSemaphorePermit>, Error> {
    match semaphore.clone().try_acquire_owned() {
        Ok(permit) => Ok(Some(permit)),
        Err(tokio::sync::TryAcquireError::NoPermits) => Ok(None),
        Err(tokio::sync::TryAcquireError::Closed) => Err(GateError::Closed {
            resource: resource.to_string(),
        }
        .into()),
    }
}

/// Create a semaphore with a specified number of permits
#[must_use]
pub fn create_semaphore(permits: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(permits))
}
