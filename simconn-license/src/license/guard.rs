use std::sync::Arc;

use super::controller::Shared;

/// Marks the license as in use. Dropping it ends the usage exactly once.
#[must_use = "the license is only marked in use while the guard is alive"]
pub struct UsageGuard {
    shared: Arc<Shared>,
}

impl UsageGuard {
    pub(super) fn new(shared: Arc<Shared>) -> UsageGuard {
        UsageGuard { shared }
    }
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        self.shared.end_usage();
    }
}

impl std::fmt::Debug for UsageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::license::{LeaseConfig, LeaseController};

    fn early_return(controller: &LeaseController, fail: bool) -> Result<(), &'static str> {
        let _guard = controller.begin_usage().unwrap();
        if fail {
            return Err("routine failed");
        }
        Ok(())
    }

    #[tokio::test]
    async fn guard_closes_on_every_exit_path() {
        let controller = LeaseController::new(
            LeaseConfig::new(Duration::from_secs(60)),
            || Ok(()),
            || Ok(()),
        )
        .unwrap();
        controller.acquire_lease().unwrap();

        assert!(early_return(&controller, true).is_err());
        assert_eq!(0, controller.active_usage());
        assert!(early_return(&controller, false).is_ok());
        assert_eq!(0, controller.active_usage());

        let outer = controller.begin_usage().unwrap();
        let nested = controller.begin_usage().unwrap();
        assert_eq!(2, controller.active_usage());
        drop(nested);
        assert_eq!(1, controller.active_usage());
        drop(outer);
        assert_eq!(0, controller.active_usage());
        assert!(controller.is_held());
    }
}
