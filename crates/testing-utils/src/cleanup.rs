//! Fail-soft teardown bookkeeping.

use std::fmt::Display;

use hatchetest_errors::{HatchetestError, HatchetestResult};
use tracing::warn;

/// Collects teardown failures so every cleanup step runs even after one fails.
#[derive(Debug, Default)]
pub struct CleanupErrors {
    failures: Vec<String>,
}

impl CleanupErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<E: Display>(&mut self, step: &str, result: Result<(), E>) {
        if let Err(e) = result {
            warn!("Cleanup step '{}' failed: {}", step, e);
            self.failures.push(format!("{step}: {e}"));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn into_result(self) -> HatchetestResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(HatchetestError::Cleanup(self.failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_is_ok() {
        let mut errors = CleanupErrors::new();
        errors.record::<String>("test server shutdown", Ok(()));
        errors.record::<String>("network removal", Ok(()));
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_every_failure_is_reported() {
        let mut errors = CleanupErrors::new();
        errors.record("test server shutdown", Err("already stopped"));
        errors.record::<&str>("hatchet container", Ok(()));
        errors.record("postgres container", Err(anyhow::anyhow!("no such container")));
        errors.record("network removal", Err("network in use"));
        assert_eq!(errors.len(), 3);

        match errors.into_result() {
            Err(HatchetestError::Cleanup(failures)) => {
                assert_eq!(
                    failures,
                    vec![
                        "test server shutdown: already stopped".to_string(),
                        "postgres container: no such container".to_string(),
                        "network removal: network in use".to_string(),
                    ]
                );
            }
            other => panic!("expected aggregated cleanup error, got {other:?}"),
        }
    }
}
