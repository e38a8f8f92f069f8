//! Engine-thread → host-thread event delivery.
//!
//! Events travel through a bounded queue. Property changes are coalesced per
//! subscription: the queue only carries a marker, the latest value waits in a
//! side table until the host drains it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::observe::SubscriptionId;
use crate::event::Event;
use crate::value::Value;

enum Queued {
  Event(Event),
  PropertyChanged(SubscriptionId),
}

struct PendingChange {
  name: String,
  value: Value,
  /// Whether a marker for this change sits in the queue.
  queued: bool,
}

#[derive(Default)]
struct Shared {
  overflowed: AtomicBool,
  pending: Mutex<HashMap<SubscriptionId, PendingChange>>,
}

/// Engine-side producer handle. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct EventSink {
  tx: Sender<Queued>,
  shared: Arc<Shared>,
  wake: Arc<Notify>,
}

impl EventSink {
  /// Queue an event. Drops it (and flags an overflow) when the queue is full.
  pub fn emit(&self, event: Event) {
    match event {
      Event::PropertyChange { id, name, value } => self.property_changed(id, name, value),
      other => {
        self.push(Queued::Event(other));
      }
    }
  }

  fn property_changed(&self, id: SubscriptionId, name: String, value: Value) {
    let mut pending = self.shared.pending.lock();
    match pending.entry(id) {
      Entry::Occupied(mut entry) => {
        let change = entry.get_mut();
        change.name = name;
        change.value = value;
        if change.queued {
          self.wake.notify_one();
        } else {
          change.queued = self.push(Queued::PropertyChanged(id));
        }
      }
      Entry::Vacant(entry) => {
        let queued = self.push(Queued::PropertyChanged(id));
        entry.insert(PendingChange {
          name,
          value,
          queued,
        });
      }
    }
  }

  fn push(&self, item: Queued) -> bool {
    match self.tx.try_send(item) {
      Ok(()) => {
        self.wake.notify_one();
        true
      }
      Err(TrySendError::Full(_)) => {
        if !self.shared.overflowed.swap(true, Ordering::AcqRel) {
          log::warn!("Event queue full, dropping events until the host drains it");
        }
        self.wake.notify_one();
        false
      }
      Err(TrySendError::Closed(_)) => false,
    }
  }
}

/// Host-side consumer of the event queue.
pub(crate) struct EventBridge {
  rx: Receiver<Queued>,
  shared: Arc<Shared>,
}

impl EventBridge {
  pub(crate) fn new(capacity: usize, wake: Arc<Notify>) -> (EventSink, Self) {
    let (tx, rx) = async_channel::bounded(capacity);
    let shared = Arc::new(Shared::default());
    let sink = EventSink {
      tx,
      shared: shared.clone(),
      wake,
    };
    (sink, Self { rx, shared })
  }

  /// Deliver everything queued at call time, in order.
  ///
  /// Ends with one `QueueOverflow` if events were lost since the last drain,
  /// followed by property changes whose marker did not fit in the queue.
  pub(crate) fn drain(&self, mut deliver: impl FnMut(Event)) -> usize {
    let budget = self.rx.len();
    let mut delivered = 0;

    for _ in 0..budget {
      let Ok(item) = self.rx.try_recv() else {
        break;
      };
      match item {
        Queued::Event(event) => deliver(event),
        Queued::PropertyChanged(id) => {
          let Some(change) = self.shared.pending.lock().remove(&id) else {
            // unsubscribed while in flight
            continue;
          };
          deliver(Event::PropertyChange {
            id,
            name: change.name,
            value: change.value,
          });
        }
      }
      delivered += 1;
    }

    if self.shared.overflowed.swap(false, Ordering::AcqRel) {
      deliver(Event::QueueOverflow);
      delivered += 1;

      let unqueued: Vec<(SubscriptionId, PendingChange)> = {
        let mut pending = self.shared.pending.lock();
        let ids: Vec<SubscriptionId> = pending
          .iter()
          .filter(|(_, change)| !change.queued)
          .map(|(id, _)| *id)
          .collect();
        ids
          .into_iter()
          .filter_map(|id| pending.remove(&id).map(|change| (id, change)))
          .collect()
      };
      for (id, change) in unqueued {
        deliver(Event::PropertyChange {
          id,
          name: change.name,
          value: change.value,
        });
        delivered += 1;
      }
    }

    delivered
  }

  /// Drop any in-flight change for a subscription.
  pub(crate) fn forget(&self, id: SubscriptionId) {
    self.shared.pending.lock().remove(&id);
  }

  /// Stop accepting events and discard everything undelivered.
  pub(crate) fn close(&self) {
    self.rx.close();
    while self.rx.try_recv().is_ok() {}
    self.shared.pending.lock().clear();
    self.shared.overflowed.store(false, Ordering::Release);
  }

  pub(crate) fn queued(&self) -> usize {
    self.rx.len()
  }
}
