//! Death-recovery bookkeeping shared by every HAL proxy.
//!
//! A proxy links a death recipient for each remote it holds and receives a
//! generation cookie from [`DeathMonitor::link`]. When the remote dies (a
//! death notification, a transport error, or a `terminate` that was never
//! confirmed), the proxy claims the death with that cookie:
//!
//! 1. [`DeathMonitor::claim`] moves the generation from alive to dying.
//!    Stale cookies and repeated claims get `None`.
//! 2. The proxy clears its cached handles under its own lock.
//! 3. [`DeathTicket::finish`] invokes the registered handler and releases
//!    any `terminate` waiting for confirmation. No lock is held at that point.

use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Invoked once the remote HAL service has died and the proxy has dropped its handles.
pub trait DeathHandler: Send + Sync {
    fn on_death(&self);
}

impl<F> DeathHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_death(&self) {
        self()
    }
}

/// Receives raw death notifications from a remote endpoint.
pub trait DeathRecipient: Send + Sync {
    fn binder_died(&self, cookie: u64);
}

/// Forwards death notifications to a proxy without keeping it alive.
pub struct WeakRecipient<T> {
    target: Weak<T>,
    on_death: fn(&T, u64),
}

impl<T> WeakRecipient<T> {
    pub fn new(target: Weak<T>, on_death: fn(&T, u64)) -> Self {
        Self { target, on_death }
    }
}

impl<T: Send + Sync> DeathRecipient for WeakRecipient<T> {
    fn binder_died(&self, cookie: u64) {
        match self.target.upgrade() {
            Some(target) => (self.on_death)(&target, cookie),
            None => log::debug!("death notification {cookie} after proxy was dropped"),
        }
    }
}

struct MonitorState {
    handler: Option<Arc<dyn DeathHandler>>,
    generation: u64,
    alive: bool,
    waiter: Option<SyncSender<()>>,
}

pub struct DeathMonitor {
    tag: &'static str,
    timeout: Duration,
    state: Mutex<MonitorState>,
}

impl DeathMonitor {
    pub fn new(tag: &'static str, timeout: Duration) -> Self {
        Self {
            tag,
            timeout,
            state: Mutex::new(MonitorState {
                handler: None,
                generation: 0,
                alive: false,
                waiter: None,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().expect("death monitor mutex poisoned")
    }

    /// Starts a new generation and returns its cookie.
    pub fn link(&self) -> u64 {
        let mut state = self.state();
        state.generation += 1;
        state.alive = true;
        state.generation
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    pub fn is_alive(&self) -> bool {
        self.state().alive
    }

    /// Replaces the death handler. Returns `true` if one was already registered.
    pub fn register(&self, handler: Arc<dyn DeathHandler>) -> bool {
        let replaced = self.state().handler.replace(handler).is_some();
        if replaced {
            log::warn!("{}: death handler already present", self.tag);
        }
        replaced
    }

    /// Drops the death handler. Returns `false` if none was registered.
    pub fn deregister(&self) -> bool {
        let removed = self.state().handler.take().is_some();
        if !removed {
            log::error!("{}: no death handler present", self.tag);
        }
        removed
    }

    pub fn has_handler(&self) -> bool {
        self.state().handler.is_some()
    }

    /// Claims the death of generation `cookie`, or of the current generation when `None`.
    pub fn claim(&self, cookie: Option<u64>) -> Option<DeathTicket> {
        let mut state = self.state();
        if let Some(cookie) = cookie {
            if cookie != state.generation {
                log::info!(
                    "{}: ignoring stale death notification (cookie {cookie}, current {})",
                    self.tag,
                    state.generation
                );
                return None;
            }
        }
        if !state.alive {
            log::debug!("{}: death already handled for generation {}", self.tag, state.generation);
            return None;
        }
        state.alive = false;
        Some(DeathTicket {
            tag: self.tag,
            handler: state.handler.clone(),
            waiter: state.waiter.take(),
        })
    }

    /// Arms a single-fire latch released by the next claimed death.
    pub fn arm(&self) -> DeathLatch {
        let (tx, rx) = sync_channel(1);
        self.state().waiter = Some(tx);
        DeathLatch {
            rx,
            timeout: self.timeout,
        }
    }
}

/// Latch armed by `terminate`, released when the death is processed.
pub struct DeathLatch {
    rx: Receiver<()>,
    timeout: Duration,
}

impl DeathLatch {
    /// Blocks up to the configured timeout. Returns `false` if no death was observed.
    pub fn wait(self) -> bool {
        match self.rx.recv_timeout(self.timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Proof that the caller owns the transition to dead for one generation.
#[must_use = "finish() must run after the handles are cleared"]
pub struct DeathTicket {
    tag: &'static str,
    handler: Option<Arc<dyn DeathHandler>>,
    waiter: Option<SyncSender<()>>,
}

impl DeathTicket {
    pub fn finish(self) {
        match &self.handler {
            Some(handler) => handler.on_death(),
            None => log::debug!("{}: service died with no death handler", self.tag),
        }
        if let Some(waiter) = self.waiter {
            let _ = waiter.try_send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler() -> (Arc<AtomicUsize>, Arc<dyn DeathHandler>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler: Arc<dyn DeathHandler> = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn claim_fires_once_per_generation() {
        let monitor = DeathMonitor::new("test", Duration::from_millis(10));
        let (count, handler) = counting_handler();
        monitor.register(handler);

        let cookie = monitor.link();
        monitor.claim(Some(cookie)).expect("first claim").finish();
        assert!(monitor.claim(Some(cookie)).is_none());
        assert!(monitor.claim(None).is_none());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_cookie_is_ignored() {
        let monitor = DeathMonitor::new("test", Duration::from_millis(10));
        let old = monitor.link();
        let current = monitor.link();
        assert!(monitor.claim(Some(old)).is_none());
        assert!(monitor.is_alive());
        assert!(monitor.claim(Some(current)).is_some());
    }

    #[test]
    fn latch_times_out_without_death() {
        let monitor = DeathMonitor::new("test", Duration::from_millis(5));
        monitor.link();
        assert!(!monitor.arm().wait());
    }

    #[test]
    fn latch_is_released_by_finish() {
        let monitor = DeathMonitor::new("test", Duration::from_millis(500));
        monitor.link();
        let latch = monitor.arm();
        monitor.claim(None).expect("claim").finish();
        assert!(latch.wait());
    }

    #[test]
    fn register_reports_replacement() {
        let monitor = DeathMonitor::new("test", Duration::from_millis(5));
        let (_, first) = counting_handler();
        let (_, second) = counting_handler();
        assert!(!monitor.register(first));
        assert!(monitor.register(second));
        assert!(monitor.deregister());
        assert!(!monitor.deregister());
    }
}
