//! Property observers and the registry of last-known observed values.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::value::Value;

/// Identifier of a property subscription, unique within one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
  pub(crate) fn new(id: u64) -> Self {
    Self(id)
  }

  pub fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for SubscriptionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Host-thread handler invoked with the property name and its new value.
pub type PropertyHandler = Box<dyn FnMut(&str, &Value)>;

/// Last delivered value per observed property name.
#[derive(Debug, Default)]
pub struct PropertyRegistry {
  values: HashMap<String, Value>,
}

impl PropertyRegistry {
  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.get(name)
  }

  /// Store a new value; returns whether it differs from the previous one.
  pub(crate) fn update(&mut self, name: &str, value: &Value) -> bool {
    match self.values.get_mut(name) {
      Some(current) if current == value => false,
      Some(current) => {
        *current = value.clone();
        true
      }
      None => {
        self.values.insert(name.to_string(), value.clone());
        true
      }
    }
  }

  pub(crate) fn remove(&mut self, name: &str) {
    self.values.remove(name);
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

struct Observer {
  name: String,
  handler: PropertyHandler,
}

/// Observer bookkeeping: id → observer, property name → ids.
#[derive(Default)]
pub(crate) struct ObservationManager {
  last_id: u64,
  observers: HashMap<SubscriptionId, Observer>,
  by_property: HashMap<String, BTreeSet<SubscriptionId>>,
  registry: PropertyRegistry,
}

impl ObservationManager {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Reserve the next subscription id.
  pub(crate) fn next_id(&mut self) -> SubscriptionId {
    self.last_id += 1;
    SubscriptionId::new(self.last_id)
  }

  pub(crate) fn register(&mut self, id: SubscriptionId, name: &str, handler: PropertyHandler) {
    self.observers.insert(
      id,
      Observer {
        name: name.to_string(),
        handler,
      },
    );
    self.by_property.entry(name.to_string()).or_default().insert(id);
  }

  /// Remove a subscription; returns the property name it observed.
  pub(crate) fn unregister(&mut self, id: SubscriptionId) -> Option<String> {
    let observer = self.observers.remove(&id)?;
    if let Some(ids) = self.by_property.get_mut(&observer.name) {
      ids.remove(&id);
      if ids.is_empty() {
        self.by_property.remove(&observer.name);
        self.registry.remove(&observer.name);
      }
    }
    Some(observer.name)
  }

  /// Invoke the handler for `id`. Unknown ids are dropped.
  pub(crate) fn deliver(&mut self, id: SubscriptionId, name: &str, value: &Value) -> bool {
    let Some(observer) = self.observers.get_mut(&id) else {
      log::debug!("Dropping change of {} for removed subscription {}", name, id);
      return false;
    };
    if observer.name != name {
      log::warn!(
        "Subscription {} observes {}, engine reported {}",
        id,
        observer.name,
        name
      );
    }
    self.registry.update(&observer.name, value);
    (observer.handler)(&observer.name, value);
    true
  }

  pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
    self.observers.contains_key(&id)
  }

  pub(crate) fn subscriptions_for(&self, name: &str) -> Vec<SubscriptionId> {
    self
      .by_property
      .get(name)
      .map(|ids| ids.iter().copied().collect())
      .unwrap_or_default()
  }

  pub(crate) fn registry(&self) -> &PropertyRegistry {
    &self.registry
  }

  pub(crate) fn clear(&mut self) {
    self.observers.clear();
    self.by_property.clear();
    self.registry = PropertyRegistry::default();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  fn recorder() -> (Rc<RefCell<Vec<(String, Value)>>>, PropertyHandler) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let handler: PropertyHandler =
      Box::new(move |name, value| sink.borrow_mut().push((name.to_string(), value.clone())));
    (seen, handler)
  }

  #[test]
  fn test_ids_are_monotonic() {
    let mut manager = ObservationManager::new();
    let a = manager.next_id();
    let b = manager.next_id();
    assert!(b > a);
    assert_eq!(a.get(), 1);
  }

  #[test]
  fn test_multiple_observers_per_property() {
    let mut manager = ObservationManager::new();
    let (seen_a, handler_a) = recorder();
    let (seen_b, handler_b) = recorder();
    let a = manager.next_id();
    manager.register(a, "time-pos", handler_a);
    let b = manager.next_id();
    manager.register(b, "time-pos", handler_b);
    assert_eq!(manager.subscriptions_for("time-pos"), vec![a, b]);

    assert!(manager.deliver(a, "time-pos", &Value::Double(1.0)));
    assert!(manager.deliver(b, "time-pos", &Value::Double(1.0)));
    assert_eq!(seen_a.borrow().len(), 1);
    assert_eq!(seen_b.borrow()[0], ("time-pos".to_string(), Value::Double(1.0)));
    assert_eq!(manager.registry().get("time-pos"), Some(&Value::Double(1.0)));
  }

  #[test]
  fn test_unregistered_id_is_dropped() {
    let mut manager = ObservationManager::new();
    let (seen, handler) = recorder();
    let id = manager.next_id();
    manager.register(id, "pause", handler);
    assert_eq!(manager.unregister(id), Some("pause".to_string()));
    assert!(!manager.deliver(id, "pause", &Value::Flag(true)));
    assert!(seen.borrow().is_empty());
    assert!(manager.registry().is_empty());
    assert_eq!(manager.unregister(id), None);
  }

  #[test]
  fn test_registry_keeps_value_while_other_observer_remains() {
    let mut manager = ObservationManager::new();
    let (_, handler_a) = recorder();
    let (_, handler_b) = recorder();
    let a = manager.next_id();
    manager.register(a, "volume", handler_a);
    let b = manager.next_id();
    manager.register(b, "volume", handler_b);
    manager.deliver(a, "volume", &Value::Double(50.0));
    manager.unregister(a);
    assert_eq!(manager.registry().get("volume"), Some(&Value::Double(50.0)));
    manager.unregister(b);
    assert_eq!(manager.registry().get("volume"), None);
  }

  #[test]
  fn test_registry_update_reports_changes() {
    let mut registry = PropertyRegistry::default();
    assert!(registry.update("pause", &Value::Flag(false)));
    assert!(!registry.update("pause", &Value::Flag(false)));
    assert!(registry.update("pause", &Value::Flag(true)));
    assert_eq!(registry.len(), 1);
  }
}
