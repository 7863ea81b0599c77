mod controller;
mod error;
mod guard;
mod timer;

use std::time::Duration;

pub use controller::{LeaseCallback, LeaseController, LeaseState};
pub use error::LeaseError;
pub use guard::UsageGuard;

pub mod cfg {
    use std::time::Duration;

    pub const DEFAULT_LOCK_TIME: Duration = Duration::from_secs(10);

    pub const DEFAULT_LICENSE_NAME: &str = "simulator";
}

#[derive(Clone, Debug)]
pub struct LeaseConfig {
    /// Idle time before a held license is released.
    pub lock_time: Duration,
    /// Reported on every log event of the controller.
    pub name: String,
}

impl LeaseConfig {
    pub fn new(lock_time: Duration) -> LeaseConfig {
        LeaseConfig {
            lock_time,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> LeaseConfig {
        self.name = name.into();
        self
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            lock_time: cfg::DEFAULT_LOCK_TIME,
            name: cfg::DEFAULT_LICENSE_NAME.to_string(),
        }
    }
}
