//! Application event bus.
//!
//! Settings and cache changes are broadcast through an explicitly
//! constructed bus that is injected where needed, rather than signaled
//! through process-wide globals.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

/// Events components may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
  /// A user-visible setting changed (purity filter and friends)
  SettingsChanged,
  /// The search cache was cleared
  CacheCleared,
  /// A background refresh replaced a cache entry
  CacheRefreshed { query: String },
}

/// Broadcast bus for [`AppEvent`]s.
///
/// Cloning shares the underlying channel; subscribers only see events
/// emitted after they subscribe.
#[derive(Debug, Clone)]
pub struct EventBus {
  tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
    self.tx.subscribe()
  }

  /// Emit an event. Having no subscribers is not an error.
  pub fn emit(&self, event: AppEvent) {
    let _ = self.tx.send(event);
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_subscriber_receives_event() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.emit(AppEvent::CacheCleared);

    assert_eq!(rx.recv().await.unwrap(), AppEvent::CacheCleared);
  }

  #[tokio::test]
  async fn test_emit_without_subscribers_is_fine() {
    let bus = EventBus::new();
    bus.emit(AppEvent::SettingsChanged);
  }

  #[tokio::test]
  async fn test_all_subscribers_receive() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.emit(AppEvent::CacheRefreshed {
      query: "cats".to_string(),
    });

    let expected = AppEvent::CacheRefreshed {
      query: "cats".to_string(),
    };
    assert_eq!(a.recv().await.unwrap(), expected);
    assert_eq!(b.recv().await.unwrap(), expected);
  }

  #[tokio::test]
  async fn test_clone_shares_channel() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    let other = bus.clone();
    other.emit(AppEvent::CacheCleared);

    assert_eq!(rx.recv().await.unwrap(), AppEvent::CacheCleared);
  }
}
