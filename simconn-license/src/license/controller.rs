use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{runtime::Handle, sync::watch, task::JoinError};
use tracing::Dispatch;

use super::{error::LeaseError, guard::UsageGuard, timer::IdleTimer, LeaseConfig};

pub type LeaseCallback = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseState {
    Released,
    Held,
}

/// Keeps a costly external license held only while it is in use.
///
/// Callers acquire the license once, then wrap every unit of work in a
/// [`UsageGuard`] from [`LeaseController::begin_usage`]. When the last guard
/// is dropped an idle timer is armed, and the license is handed back through
/// the release callback once it has stayed idle for the configured lock time.
pub struct LeaseController {
    shared: Arc<Shared>,
}

pub(super) struct Shared {
    config: LeaseConfig,
    acquire_fn: LeaseCallback,
    release_fn: LeaseCallback,
    state: Mutex<State>,
    // Serializes callback invocations. Never taken while `state` is held.
    transition: Mutex<()>,
    runtime: Handle,
    held_tx: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct State {
    held: bool,
    active_usage: usize,
    timer: IdleTimer,
    disposed: bool,
}

impl LeaseController {
    /// Must be called from within a tokio runtime, which drives the idle timer.
    pub fn new<R, A>(
        config: LeaseConfig,
        release_fn: R,
        acquire_fn: A,
    ) -> Result<LeaseController, LeaseError>
    where
        R: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
        A: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()?;
        let (held_tx, _) = watch::channel(false);

        Ok(LeaseController {
            shared: Arc::new(Shared {
                config,
                acquire_fn: Box::new(acquire_fn),
                release_fn: Box::new(release_fn),
                state: Mutex::new(State::default()),
                transition: Mutex::new(()),
                runtime,
                held_tx,
            }),
        })
    }

    pub fn acquire_lease(&self) -> Result<(), LeaseError> {
        let shared = &self.shared;
        let _transition = shared.transition();
        {
            let state = shared.state();
            if state.disposed {
                return Err(LeaseError::Disposed);
            }
            if state.held {
                return Ok(());
            }
        }

        (shared.acquire_fn)().map_err(LeaseError::Acquire)?;

        let mut state = shared.state();
        state.held = true;
        tracing::info!(license = %shared.config.name, "License acquired");
        shared.held_tx.send_replace(true);
        Ok(())
    }

    /// Mark the license as in use until the returned guard is dropped.
    ///
    /// Does not acquire the license; call [`LeaseController::acquire_lease`] first.
    pub fn begin_usage(&self) -> Result<UsageGuard, LeaseError> {
        let shared = &self.shared;
        let mut state = shared.state();
        if state.disposed {
            return Err(LeaseError::Disposed);
        }

        if !state.held {
            tracing::warn!(
                license = %shared.config.name,
                "Usage started on a license that is not held"
            );
        }

        state.active_usage += 1;
        if state.timer.cancel() {
            tracing::debug!(license = %shared.config.name, "Idle release cancelled");
        }
        drop(state);

        Ok(UsageGuard::new(shared.clone()))
    }

    /// Forget the license without calling the release callback.
    ///
    /// For when the license is known to have been released elsewhere.
    pub fn clear_lease_state(&self) {
        let shared = &self.shared;
        let mut state = shared.state();
        let cancelled = state.timer.cancel();
        let was_held = std::mem::replace(&mut state.held, false);
        shared.held_tx.send_replace(false);
        drop(state);

        if was_held {
            tracing::info!(
                license = %shared.config.name,
                cancelled_idle_release = cancelled,
                "License state cleared"
            );
        } else {
            tracing::debug!(license = %shared.config.name, "License state already clear");
        }
    }

    pub fn dispose(&self) {
        self.shared.dispose(true);
    }

    pub fn is_held(&self) -> bool {
        self.shared.state().held
    }

    pub fn state(&self) -> LeaseState {
        if self.is_held() {
            LeaseState::Held
        } else {
            LeaseState::Released
        }
    }

    pub fn active_usage(&self) -> usize {
        self.shared.state().active_usage
    }

    pub fn lock_time(&self) -> Duration {
        self.shared.config.lock_time
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Watch the held flag. Every acquire, release and clear is published.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.held_tx.subscribe()
    }
}

impl Drop for LeaseController {
    fn drop(&mut self) {
        self.shared.dispose(false);
    }
}

impl std::fmt::Debug for LeaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("LeaseController")
            .field("name", &self.shared.config.name)
            .field("lock_time", &self.shared.config.lock_time)
            .field("held", &state.held)
            .field("active_usage", &state.active_usage)
            .field("idle_release_armed", &state.timer.is_armed())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn end_usage(self: &Arc<Self>) {
        let mut state = self.state();
        if state.active_usage == 0 {
            tracing::error!(
                license = %self.config.name,
                "License usage count underflow, clamped at zero"
            );
            return;
        }

        state.active_usage -= 1;
        if state.active_usage == 0 && state.held && !state.disposed {
            self.arm_idle_timer(&mut state);
        }
    }

    fn arm_idle_timer(self: &Arc<Self>, state: &mut State) {
        let lock_time = self.config.lock_time;
        let weak = Arc::downgrade(self);
        // Release logs go to the same subscriber as the usage that armed the timer.
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        let runtime = &self.runtime;

        let generation = state.timer.arm(|generation| {
            runtime.spawn(idle_release_task(weak, generation, lock_time, dispatch))
        });

        tracing::debug!(
            license = %self.config.name,
            generation,
            ?lock_time,
            "Idle release armed"
        );
    }

    fn fire(&self, generation: u64) {
        let _transition = self.transition();
        {
            let mut state = self.state();
            if state.disposed || !state.timer.take_if_current(generation) {
                return;
            }
            if state.active_usage != 0 || !state.held {
                return;
            }
        }

        let released = panic::catch_unwind(AssertUnwindSafe(|| (self.release_fn)()))
            .unwrap_or_else(|_| Err(anyhow::anyhow!("release callback panicked")))
            .map_err(LeaseError::Release);

        match released {
            Ok(()) => {
                let mut state = self.state();
                state.held = false;
                if state.active_usage != 0 {
                    tracing::warn!(
                        license = %self.config.name,
                        active_usage = state.active_usage,
                        "License released while usage was starting"
                    );
                }
                tracing::info!(license = %self.config.name, "License released");
                self.held_tx.send_replace(false);
            }
            Err(err) => {
                tracing::error!(
                    license = %self.config.name,
                    error = %err,
                    "License release failed, still held"
                );
            }
        }
    }

    fn dispose(&self, explicit: bool) {
        let mut state = self.state();
        if state.disposed {
            if explicit {
                tracing::warn!(
                    license = %self.config.name,
                    "License controller already disposed"
                );
            }
            return;
        }

        state.disposed = true;
        state.timer.cancel();
        drop(state);

        tracing::debug!(license = %self.config.name, "License controller disposed");
    }
}

async fn idle_release_task(
    shared: Weak<Shared>,
    generation: u64,
    lock_time: Duration,
    dispatch: Dispatch,
) {
    tokio::time::sleep(lock_time).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };

    let name = shared.config.name.clone();
    let fire_dispatch = dispatch.clone();

    // The release callback may block, keep it off the async workers.
    let fired = tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&fire_dispatch, || shared.fire(generation))
    })
    .await;

    if let Err(err) = fired {
        tracing::dispatcher::with_default(&dispatch, || release_task_failed(&name, &err));
    }
}

fn release_task_failed(name: &str, err: &JoinError) {
    tracing::error!(license = %name, error = %err, "License release task failed");
}
