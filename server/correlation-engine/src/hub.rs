//! Broadcast hub: fan finished bundles out to live subscribers.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: when a
//! subscriber's queue is full that bundle is dropped for that subscriber
//! only, and queued bundles are never replaced. Slow consumers see gaps;
//! producers and other subscribers are unaffected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::CorrelationBundle;

pub type SharedBundle = Arc<CorrelationBundle>;

/// Delivery outcome of one publish. Drops are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PublishReport {
  pub delivered: usize,
  pub dropped: usize,
}

#[derive(Default)]
struct Registry {
  subscribers: HashMap<u64, mpsc::Sender<SharedBundle>>,
  closed: bool,
}

struct HubInner {
  capacity: usize,
  next_id: AtomicU64,
  registry: Mutex<Registry>,
}

impl HubInner {
  fn lock(&self) -> MutexGuard<'_, Registry> {
    self.registry.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn remove(&self, id: u64) -> bool {
    self.lock().subscribers.remove(&id).is_some()
  }
}

/// Cheaply clonable handle; clones share one registry.
#[derive(Clone)]
pub struct BroadcastHub {
  inner: Arc<HubInner>,
}

impl BroadcastHub {
  pub fn new(capacity: usize) -> Self {
    Self {
      inner: Arc::new(HubInner {
        capacity: capacity.max(1),
        next_id: AtomicU64::new(1),
        registry: Mutex::new(Registry::default()),
      }),
    }
  }

  /// Register a subscriber with a bounded queue.
  ///
  /// After `close()` the returned subscription is already at end-of-stream.
  pub fn subscribe(&self) -> Subscription {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel(self.inner.capacity);
    let mut registry = self.inner.lock();
    if !registry.closed {
      registry.subscribers.insert(id, tx);
    }
    drop(registry);
    debug!(subscriber = id, "subscribed");
    Subscription {
      id,
      rx,
      hub: Arc::downgrade(&self.inner),
    }
  }

  /// Remove a subscriber. Unknown or already removed ids are ignored.
  pub fn unsubscribe(&self, id: u64) {
    if self.inner.remove(id) {
      debug!(subscriber = id, "unsubscribed");
    }
  }

  /// Offer `bundle` to every subscriber without blocking.
  ///
  /// Full queue: skipped for that subscriber. Closed queue (receiver gone):
  /// subscriber pruned.
  pub fn publish(&self, bundle: SharedBundle) -> PublishReport {
    let mut report = PublishReport::default();
    let mut registry = self.inner.lock();
    registry.subscribers.retain(|&id, tx| match tx.try_send(Arc::clone(&bundle)) {
      Ok(()) => {
        report.delivered += 1;
        true
      }
      Err(TrySendError::Full(_)) => {
        report.dropped += 1;
        debug!(subscriber = id, "subscriber queue full, bundle dropped");
        true
      }
      Err(TrySendError::Closed(_)) => {
        debug!(subscriber = id, "subscriber gone, pruning");
        false
      }
    });
    report
  }

  pub fn subscriber_count(&self) -> usize {
    self.inner.lock().subscribers.len()
  }

  /// Drop every subscription; receivers observe end-of-stream. Later
  /// subscriptions start closed.
  pub fn close(&self) {
    let mut registry = self.inner.lock();
    registry.closed = true;
    registry.subscribers.clear();
  }
}

/// Receiving side of one subscription. Dropping it unsubscribes.
pub struct Subscription {
  id: u64,
  rx: mpsc::Receiver<SharedBundle>,
  hub: Weak<HubInner>,
}

impl Subscription {
  pub fn id(&self) -> u64 {
    self.id
  }

  /// Next bundle, or `None` once the hub dropped this subscription.
  pub async fn recv(&mut self) -> Option<SharedBundle> {
    self.rx.recv().await
  }

  /// Like `recv`, but returns `None` as soon as `cancel` fires.
  pub async fn recv_until(&mut self, cancel: &CancellationToken) -> Option<SharedBundle> {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => None,
      bundle = self.rx.recv() => bundle,
    }
  }

  /// Non-blocking poll of the queue.
  pub fn try_recv(&mut self) -> Option<SharedBundle> {
    self.rx.try_recv().ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.hub.upgrade() {
      inner.remove(self.id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Metrics;
  use std::time::Duration;

  fn bundle(start: &str) -> SharedBundle {
    Arc::new(CorrelationBundle {
      window_start: start.into(),
      window_end: start.into(),
      root_service: None,
      affected_services: vec!["api".into()],
      log_patterns: vec![],
      events: vec![],
      metrics: Metrics::default(),
      dependency_graph: vec!["api".into()],
      sequence: vec![],
      derived_root_cause_hint: "Unknown issue".into(),
    })
  }

  #[tokio::test]
  async fn full_subscriber_sees_gap_others_receive() {
    let hub = BroadcastHub::new(1);
    let mut slow = hub.subscribe();
    let mut fast = hub.subscribe();

    let first = hub.publish(bundle("t1"));
    assert_eq!(first, PublishReport { delivered: 2, dropped: 0 });
    assert_eq!(fast.recv().await.unwrap().window_start, "t1");

    // `slow` still holds t1, so t2 is dropped for it alone.
    let second = hub.publish(bundle("t2"));
    assert_eq!(second, PublishReport { delivered: 1, dropped: 1 });
    assert_eq!(fast.recv().await.unwrap().window_start, "t2");

    assert_eq!(slow.recv().await.unwrap().window_start, "t1");
    assert!(slow.try_recv().is_none());

    hub.publish(bundle("t3"));
    assert_eq!(slow.recv().await.unwrap().window_start, "t3");
  }

  #[test]
  fn unsubscribe_is_idempotent() {
    let hub = BroadcastHub::new(4);
    let sub = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 1);
    hub.unsubscribe(sub.id());
    hub.unsubscribe(sub.id());
    assert_eq!(hub.subscriber_count(), 0);
    drop(sub);
    assert_eq!(hub.subscriber_count(), 0);
    assert_eq!(hub.publish(bundle("t")), PublishReport::default());
  }

  #[test]
  fn dropped_subscription_is_removed() {
    let hub = BroadcastHub::new(4);
    let sub = hub.subscribe();
    let _other = hub.subscribe();
    drop(sub);
    assert_eq!(hub.subscriber_count(), 1);
  }

  #[tokio::test]
  async fn close_ends_every_stream() {
    let hub = BroadcastHub::new(4);
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();
    hub.close();
    assert!(a.recv().await.is_none());
    assert!(b.recv().await.is_none());
    let mut late = hub.subscribe();
    assert!(late.recv().await.is_none());
    assert_eq!(hub.subscriber_count(), 0);
  }

  #[tokio::test]
  async fn recv_until_returns_on_cancel() {
    let hub = BroadcastHub::new(4);
    let mut sub = hub.subscribe();
    let cancel = CancellationToken::new();
    let waiter = {
      let cancel = cancel.clone();
      tokio::spawn(async move { sub.recv_until(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let got = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
    assert!(got.is_none());
  }
}
