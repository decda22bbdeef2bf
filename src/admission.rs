//! Admission limiter for in-flight render work
//!
//! A counting limiter with fixed capacity `K`. The render consumer asks for a
//! token before it submits a frame and gives it back only once the surface has
//! confirmed the work is done. Acquisition never waits: at capacity the caller
//! gets [`CapacityExceeded`] and skips the frame.
//!
//! Tokens release themselves on drop, so every exit path (early return, error,
//! completion watcher finishing) returns capacity exactly once.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{CapacityExceeded, GradeError, Result};

#[derive(Clone)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionLimiter {
    /// Create a limiter with `capacity` tokens (must be at least 1).
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(GradeError::Config(
                "admission capacity must be at least 1".to_string(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS || capacity > u32::MAX as usize {
            return Err(GradeError::Config(format!(
                "admission capacity {} is too large",
                capacity
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Grant a token if fewer than `capacity` are outstanding. Never blocks.
    pub fn try_acquire(&self) -> std::result::Result<AdmissionToken, CapacityExceeded> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionToken { _permit: permit }),
            Err(_) => {
                debug!("Admission busy ({} in flight)", self.capacity);
                Err(CapacityExceeded {
                    capacity: self.capacity,
                })
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Resolve once every outstanding token has been returned.
    ///
    /// Returned tokens are parked with the waiter, so `try_acquire` reports
    /// busy until this resolves.
    pub async fn drained(&self) {
        // Capacity was checked against u32::MAX in new()
        if let Ok(all) = self.semaphore.acquire_many(self.capacity as u32).await {
            drop(all);
        }
    }
}

/// One unit of render capacity. Returned to the limiter when dropped.
#[must_use = "dropping the token releases it immediately"]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionToken {
    /// Return the token explicitly.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(AdmissionLimiter::new(0), Err(GradeError::Config(_))));
    }

    #[test]
    fn test_capacity_enforced_exactly() {
        for k in 1..=4 {
            let limiter = AdmissionLimiter::new(k).unwrap();
            let mut held: Vec<AdmissionToken> = (0..k).map(|_| limiter.try_acquire().unwrap()).collect();
            assert_eq!(limiter.in_flight(), k);
            assert_eq!(limiter.try_acquire().err(), Some(CapacityExceeded { capacity: k }));

            // One release admits exactly one more
            held.pop().unwrap().release();
            let again = limiter.try_acquire();
            assert!(again.is_ok());
            assert!(limiter.try_acquire().is_err());
            drop(again);
        }
    }

    #[test]
    fn test_drop_releases_token() {
        let limiter = AdmissionLimiter::new(1).unwrap();
        {
            let _token = limiter.try_acquire().unwrap();
            assert_eq!(limiter.in_flight(), 1);
        }
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drained_waits_for_release() {
        let limiter = AdmissionLimiter::new(2).unwrap();
        let token = limiter.try_acquire().unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.drained().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        token.release();
        waiter.await.unwrap();
        assert_eq!(limiter.in_flight(), 0);
    }
}
