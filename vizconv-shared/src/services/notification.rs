// SPDX-License-Identifier: GPL-3.0-only
use log::{debug, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Property;

/// Capacity of the relay channel handed to downstream listeners
const RELAY_CAPACITY: usize = 64;

/// A configuration property of `sender` changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationChanged {
    pub sender: Uuid,
    pub property: Property,
}

pub type ChangeHandler = Arc<dyn Fn(&ConfigurationChanged) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Maximum number of subscribers reached: {max}")]
    TooManySubscribers { max: usize },
}

struct Subscriber {
    id: Uuid,
    handler: ChangeHandler,
    created_at: Instant,
}

/// Ordered observer list for configuration change notifications.
///
/// Handlers run synchronously on the publishing thread, in subscription
/// order. The subscriber list is not locked while handlers run, so a handler
/// may subscribe, unsubscribe or read the publisher again.
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<Subscriber>>,
    relay: broadcast::Sender<Property>,
    max_subscribers: usize,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new(max_subscribers: usize) -> Self {
        let (relay, _) = broadcast::channel(RELAY_CAPACITY);
        Self {
            subscribers: RwLock::new(Vec::new()),
            relay,
            max_subscribers,
        }
    }

    /// Register a handler; returns the id needed to unsubscribe
    ///
    /// # Errors
    ///
    /// Returns an error if the maximum number of subscribers is reached.
    pub fn subscribe<F>(&self, handler: F) -> Result<Uuid, SubscriptionError>
    where
        F: Fn(&ConfigurationChanged) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.write();
        if subscribers.len() >= self.max_subscribers {
            warn!(
                "Rejected change subscriber: limit of {} reached",
                self.max_subscribers
            );
            return Err(SubscriptionError::TooManySubscribers {
                max: self.max_subscribers,
            });
        }

        let id = Uuid::new_v4();
        subscribers.push(Subscriber {
            id,
            handler: Arc::new(handler),
            created_at: Instant::now(),
        });
        debug!("Change subscriber {id} registered");
        Ok(id)
    }

    /// Returns `true` if a subscriber with this id was removed
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(index) = subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        let subscriber = subscribers.remove(index);
        debug!(
            "Change subscriber {id} removed after {:?}",
            subscriber.created_at.elapsed()
        );
        true
    }

    /// Receiver of bare property names, for chaining into another consumer's
    /// change stream. Lagging receivers lose the oldest names.
    #[must_use]
    pub fn subscribe_relay(&self) -> broadcast::Receiver<Property> {
        self.relay.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `events` in order to every subscriber
    pub fn publish(&self, events: &[ConfigurationChanged]) {
        if events.is_empty() {
            return;
        }

        let handlers: Vec<ChangeHandler> = self
            .subscribers
            .read()
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for event in events {
            for handler in &handlers {
                handler(event);
            }
            // No relay receivers is the common case
            let _ = self.relay.send(event.property);
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event(sender: Uuid, property: Property) -> ConfigurationChanged {
        ConfigurationChanged { sender, property }
    }

    #[test]
    fn test_publish_in_order_to_all_subscribers() {
        let notifier = ChangeNotifier::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = Arc::clone(&log);
            notifier
                .subscribe(move |e| log.lock().push(format!("{tag}:{}", e.property)))
                .unwrap();
        }

        let sender = Uuid::new_v4();
        notifier.publish(&[
            event(sender, Property::Source),
            event(sender, Property::FrequencyCount),
        ]);

        assert_eq!(
            *log.lock(),
            vec![
                "a:Source",
                "b:Source",
                "a:FrequencyCount",
                "b:FrequencyCount"
            ]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::default();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let id = notifier.subscribe(move |_| *counter.lock() += 1).unwrap();

        notifier.publish(&[event(Uuid::new_v4(), Property::CacheData)]);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.publish(&[event(Uuid::new_v4(), Property::CacheData)]);

        assert_eq!(*count.lock(), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_limit() {
        let notifier = ChangeNotifier::new(1);
        notifier.subscribe(|_| {}).unwrap();
        assert!(matches!(
            notifier.subscribe(|_| {}),
            Err(SubscriptionError::TooManySubscribers { max: 1 })
        ));
    }

    #[test]
    fn test_handler_may_reenter_notifier() {
        let notifier = Arc::new(ChangeNotifier::default());
        let inner = Arc::clone(&notifier);
        notifier
            .subscribe(move |_| {
                let _ = inner.subscriber_count();
            })
            .unwrap();
        notifier.publish(&[event(Uuid::new_v4(), Property::Source)]);
    }

    #[test]
    fn test_relay_receives_property_names() {
        let notifier = ChangeNotifier::default();
        let mut relay = notifier.subscribe_relay();
        notifier.publish(&[event(Uuid::new_v4(), Property::MaxFrequency)]);
        assert_eq!(relay.try_recv().unwrap(), Property::MaxFrequency);
        assert!(relay.try_recv().is_err());
    }
}
