//! Cooperative cancellation for playback and recording
//!
//! A [`CancelToken`] only ever goes from "running" to "cancelled". Readers
//! poll it lock-free; the condvar exists so sleepers wake up immediately.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use inputtape_core::{EndKey, KeyState};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Sleep for `timeout` unless cancelled first. Returns true if cancelled.
    ///
    /// A timeout past the end of the clock's range waits for cancellation.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.inner.lock.lock();
        while !self.inner.cancelled.load(Ordering::SeqCst) {
            match deadline {
                Some(at) => {
                    if self.inner.wake.wait_until(&mut guard, at).timed_out() {
                        break;
                    }
                }
                None => self.inner.wake.wait(&mut guard),
            }
        }
        self.is_cancelled()
    }
}

/// Background thread that cancels a token once the end key is held down.
///
/// The thread exits when the token is cancelled or the poller is dropped.
pub struct KeyPoller {
    stop: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl KeyPoller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);

    pub fn spawn<K>(keys: K, end_key: EndKey, token: CancelToken, interval: Duration) -> Self
    where
        K: KeyState + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread = thread::spawn(move || {
            debug!(end_key = %end_key, "end-key poller started");
            loop {
                if token.is_cancelled() {
                    break;
                }
                if end_key.class().iter().any(|&vk| keys.is_down(vk)) {
                    info!(end_key = %end_key, "end key pressed, stopping");
                    token.cancel();
                    break;
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Stop polling and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the sender disconnects the channel and wakes the thread
        self.stop.take();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for KeyPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inputtape_core::keys::vk;
    use std::sync::atomic::AtomicU16;

    #[test]
    fn token_is_one_way_and_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn wait_for_times_out_when_not_cancelled() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait_for(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_for_wakes_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(token.wait_for(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        t.join().unwrap();
    }

    #[test]
    fn unbounded_wait_ends_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert!(token.wait_for(Duration::MAX));
        t.join().unwrap();
    }

    #[derive(Clone, Default)]
    struct FakeKeys(Arc<AtomicU16>);

    impl KeyState for FakeKeys {
        fn is_down(&self, code: u16) -> bool {
            self.0.load(Ordering::SeqCst) == code
        }
    }

    #[test]
    fn poller_cancels_on_any_key_of_the_class() {
        for held in [vk::LCONTROL, vk::RCONTROL] {
            let keys = FakeKeys::default();
            let token = CancelToken::new();
            let _poller = KeyPoller::spawn(
                keys.clone(),
                EndKey::parse("CTRL").unwrap(),
                token.clone(),
                Duration::from_millis(5),
            );
            keys.0.store(held, Ordering::SeqCst);
            assert!(token.wait_for(Duration::from_secs(5)));
        }
    }

    #[test]
    fn poller_ignores_other_keys_and_stops_on_drop() {
        let keys = FakeKeys::default();
        keys.0.store(vk::LSHIFT, Ordering::SeqCst);
        let token = CancelToken::new();
        let poller = KeyPoller::spawn(
            keys,
            EndKey::parse("CTRL").unwrap(),
            token.clone(),
            Duration::from_millis(5),
        );
        thread::sleep(Duration::from_millis(30));
        poller.stop();
        assert!(!token.is_cancelled());
    }
}
