//! Admission control for service jobs.
//!
//! A request is admitted only while a slot is free; otherwise it is
//! rejected immediately rather than queued. One slot gives single-flight
//! behavior.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone)]
pub struct AdmissionControl {
    semaphore: Arc<Semaphore>,
    max_jobs: usize,
}

/// Held for the lifetime of an admitted job; the slot frees on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionControl {
    pub fn new(max_jobs: usize) -> Self {
        let max_jobs = max_jobs.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_jobs)),
            max_jobs,
        }
    }

    /// Take a slot or fail with [`WorkerError::Busy`].
    pub fn try_admit(&self) -> WorkerResult<AdmissionPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .map(|permit| AdmissionPermit { _permit: permit })
            .map_err(|_| WorkerError::Busy)
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    pub fn in_flight(&self) -> usize {
        self.max_jobs - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_single_flight_rejects_second_job() {
        let admission = AdmissionControl::new(1);
        let first = assert_ok!(admission.try_admit());
        assert_eq!(admission.in_flight(), 1);
        assert!(admission.try_admit().unwrap_err().is_busy());

        drop(first);
        assert_eq!(admission.in_flight(), 0);
        assert_ok!(admission.try_admit());
    }

    #[test]
    fn test_zero_is_treated_as_one() {
        let admission = AdmissionControl::new(0);
        assert_eq!(admission.max_jobs(), 1);
    }

    #[test]
    fn test_raised_limit() {
        let admission = AdmissionControl::new(2);
        let _a = assert_ok!(admission.try_admit());
        let _b = assert_ok!(admission.try_admit());
        assert_err!(admission.try_admit());
    }
}
