use tokio::task::JoinHandle;

/// One-shot idle timer slot.
///
/// Every arm and cancel moves the generation forward. A fire only proceeds
/// when it presents the generation it was armed with and that arming is
/// still pending, so a cancel and a fire can never both win.
#[derive(Debug, Default)]
pub(crate) struct IdleTimer {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl IdleTimer {
    pub fn arm<F>(&mut self, spawn: F) -> u64
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(spawn(self.generation));
        self.generation
    }

    /// Return true if an armed timer was cancelled.
    pub fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Claim the fire for `generation`. Must be called with the owning lock held.
    pub fn take_if_current(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && self.generation == generation {
            self.pending = None;
            return true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod test {
    use std::future::pending;

    use super::IdleTimer;

    #[tokio::test]
    async fn stale_generation_cannot_fire() {
        let mut timer = IdleTimer::default();
        let first = timer.arm(|_| tokio::spawn(pending()));
        let second = timer.arm(|_| tokio::spawn(pending()));
        assert_ne!(first, second);

        assert!(!timer.take_if_current(first));
        assert!(timer.is_armed());
        assert!(timer.take_if_current(second));
        assert!(!timer.is_armed());

        // Already claimed.
        assert!(!timer.take_if_current(second));
    }

    #[tokio::test]
    async fn cancel_invalidates_armed_generation() {
        let mut timer = IdleTimer::default();
        assert!(!timer.cancel());

        let generation = timer.arm(|_| tokio::spawn(pending()));
        assert!(timer.cancel());
        assert!(!timer.is_armed());
        assert!(!timer.take_if_current(generation));
    }

    #[tokio::test]
    async fn cancel_aborts_the_timer_task() {
        let mut timer = IdleTimer::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        timer.arm(move |_| {
            tokio::spawn(async move {
                let _tx = tx;
                pending::<()>().await
            })
        });
        timer.cancel();

        // The sender is dropped once the aborted task is torn down.
        assert!(rx.await.is_err());
    }
}
