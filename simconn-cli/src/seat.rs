use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use simconn_license::license::{LeaseConfig, LeaseController, LeaseError};

/// Stand-in for a license server: checkout and return each take `delay`.
#[derive(Debug)]
pub struct SimulatedSeat {
    name: String,
    delay: Duration,
    checkouts: AtomicUsize,
    returns: AtomicUsize,
}

impl SimulatedSeat {
    pub fn new(name: impl Into<String>, delay: Duration) -> Arc<SimulatedSeat> {
        Arc::new(SimulatedSeat {
            name: name.into(),
            delay,
            checkouts: AtomicUsize::new(0),
            returns: AtomicUsize::new(0),
        })
    }

    pub fn checkout(&self) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        let n = self.checkouts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(seat = %self.name, checkouts = n, "Seat checked out");
        Ok(())
    }

    pub fn give_back(&self) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        let n = self.returns.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(seat = %self.name, returns = n, "Seat returned");
        Ok(())
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }

    pub fn returns(&self) -> usize {
        self.returns.load(Ordering::SeqCst)
    }

    /// Build a controller whose callbacks go through this seat.
    pub fn controller(
        self: &Arc<Self>,
        lock_time: Duration,
    ) -> Result<LeaseController, LeaseError> {
        let release_seat = self.clone();
        let acquire_seat = self.clone();
        LeaseController::new(
            LeaseConfig::new(lock_time).with_name(self.name.clone()),
            move || release_seat.give_back(),
            move || acquire_seat.checkout(),
        )
    }
}
