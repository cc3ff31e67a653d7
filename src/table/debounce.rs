//! Trailing-edge debounce for table refreshes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Runs only the last task scheduled within `delay`.
///
/// Each call supersedes the one before it. A task that has already started
/// running is left alone; only tasks still waiting out the delay are dropped.
pub struct Debouncer {
  delay: Duration,
  generation: Arc<AtomicU64>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      generation: Arc::new(AtomicU64::new(0)),
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Schedule `task` after the delay. Must be called inside a tokio runtime.
  pub fn call<F>(&self, task: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let generation = Arc::clone(&self.generation);
    let delay = self.delay;

    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      if generation.load(Ordering::SeqCst) == ticket {
        task.await;
      }
    });
  }

  /// Drop whatever is waiting.
  pub fn cancel(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
  }
}

impl Default for Debouncer {
  fn default() -> Self {
    Self::new(DEFAULT_DEBOUNCE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  #[tokio::test]
  async fn test_only_last_call_runs() {
    let debouncer = Debouncer::new(Duration::from_millis(30));
    let seen = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
      let seen = Arc::clone(&seen);
      debouncer.call(async move {
        seen.lock().unwrap().push(i);
      });
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*seen.lock().unwrap(), vec![2]);
  }

  #[tokio::test]
  async fn test_spaced_calls_all_run() {
    let debouncer = Debouncer::new(Duration::from_millis(10));
    let seen = Arc::new(Mutex::new(Vec::new()));

    for i in 0..2 {
      let seen = Arc::clone(&seen);
      debouncer.call(async move {
        seen.lock().unwrap().push(i);
      });
      tokio::time::sleep(Duration::from_millis(60)).await;
    }

    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
  }

  #[tokio::test]
  async fn test_cancel_drops_pending() {
    let debouncer = Debouncer::new(Duration::from_millis(20));
    let seen = Arc::new(Mutex::new(Vec::<u32>::new()));

    let inner = Arc::clone(&seen);
    debouncer.call(async move {
      inner.lock().unwrap().push(1);
    });
    debouncer.cancel();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(seen.lock().unwrap().is_empty());
  }
}
