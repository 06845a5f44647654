//! Mutual exclusion of write actions.
//!
//! Account-abstraction nonces are sequential; two concurrent pipelines against the same account
//! race for one nonce. At most one write may be in flight at a time.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use crate::{GaslessError, Result};

/// The in-flight flag of an application.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<AtomicBool>,
    last_id: Arc<AtomicU64>,
}

impl InFlight {
    /// Creates an idle flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag, failing with [`GaslessError::PipelineBusy`] if a write is in flight.
    pub fn try_acquire(&self) -> Result<InFlightGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GaslessError::PipelineBusy)?;
        let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(InFlightGuard { active: Arc::clone(&self.active), id })
    }

    /// Whether a write is in flight.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the in-flight flag when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<AtomicBool>,
    id: u64,
}

impl InFlightGuard {
    /// Identifier of the action holding the flag, unique per [`InFlight`].
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let in_flight = InFlight::new();
        let guard = in_flight.try_acquire().unwrap();
        assert!(in_flight.is_active());
        assert!(matches!(in_flight.try_acquire(), Err(GaslessError::PipelineBusy)));

        drop(guard);
        assert!(!in_flight.is_active());
        let next = in_flight.try_acquire().unwrap();
        assert_eq!(next.id(), 2);
    }

    #[test]
    fn test_clones_share_the_flag() {
        let in_flight = InFlight::new();
        let other = in_flight.clone();
        let _guard = in_flight.try_acquire().unwrap();
        assert!(other.is_active());
        assert!(other.try_acquire().is_err());
    }
}
