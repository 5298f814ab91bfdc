use crate::models::{ChangeRequest, Profile, SapObject, Settings, Task, Theme};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    TasksUpdated(Vec<Task>),
    ObjectsUpdated(Vec<SapObject>),
    RequestsUpdated(Vec<ChangeRequest>),
    ProfileUpdated(Profile),
    SettingsUpdated(Settings),
    DataImported,
    DataCleared,
    ThemeChanged(Theme),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TasksUpdated,
    ObjectsUpdated,
    RequestsUpdated,
    ProfileUpdated,
    SettingsUpdated,
    DataImported,
    DataCleared,
    ThemeChanged,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TasksUpdated => "tasksUpdated",
            Self::ObjectsUpdated => "objectsUpdated",
            Self::RequestsUpdated => "requestsUpdated",
            Self::ProfileUpdated => "profileUpdated",
            Self::SettingsUpdated => "settingsUpdated",
            Self::DataImported => "dataImported",
            Self::DataCleared => "dataCleared",
            Self::ThemeChanged => "themeChanged",
        }
    }
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TasksUpdated(_) => EventKind::TasksUpdated,
            Self::ObjectsUpdated(_) => EventKind::ObjectsUpdated,
            Self::RequestsUpdated(_) => EventKind::RequestsUpdated,
            Self::ProfileUpdated(_) => EventKind::ProfileUpdated,
            Self::SettingsUpdated(_) => EventKind::SettingsUpdated,
            Self::DataImported => EventKind::DataImported,
            Self::DataCleared => EventKind::DataCleared,
            Self::ThemeChanged(_) => EventKind::ThemeChanged,
        }
    }
}

pub type SubscriptionId = String;
type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<ChangeEvent>),
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    sink: Sink,
}

/// Fan-out of storage change notifications. Callbacks run on the publishing thread after
/// the write completed; channel subscribers are dropped once their receiver is gone.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Sink::Callback(Arc::new(callback)))
    }

    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.register(None, Sink::Callback(Arc::new(callback)))
    }

    pub fn channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.register(None, Sink::Channel(sender));
        (id, receiver)
    }

    pub fn unsubscribe(&self, id: &str) -> bool {
        let Ok(mut subscriptions) = self.subscriptions.write() else {
            tracing::error!("event bus lock poisoned");
            return false;
        };
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().map(|subscriptions| subscriptions.len()).unwrap_or(0)
    }

    pub fn publish(&self, event: ChangeEvent) {
        let kind = event.kind();
        let targets: Vec<Subscription> = match self.subscriptions.read() {
            Ok(subscriptions) => subscriptions
                .iter()
                .filter(|subscription| subscription.kind.map_or(true, |wanted| wanted == kind))
                .cloned()
                .collect(),
            Err(_) => {
                tracing::error!(event = kind.as_str(), "event bus lock poisoned");
                return;
            }
        };
        tracing::debug!(event = kind.as_str(), subscribers = targets.len(), "publishing change event");

        let mut closed = Vec::new();
        for subscription in targets {
            match subscription.sink {
                Sink::Callback(callback) => callback(&event),
                Sink::Channel(sender) => {
                    if sender.send(event.clone()).is_err() {
                        closed.push(subscription.id);
                    }
                }
            }
        }

        for id in closed {
            self.unsubscribe(&id);
        }
    }

    fn register(&self, kind: Option<EventKind>, sink: Sink) -> SubscriptionId {
        let id = Uuid::new_v4().to_string();
        match self.subscriptions.write() {
            Ok(mut subscriptions) => subscriptions.push(Subscription {
                id: id.clone(),
                kind,
                sink,
            }),
            Err(_) => tracing::error!("event bus lock poisoned"),
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeEvent, EventBus, EventKind};
    use crate::models::Theme;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn kind_subscription_only_sees_its_events() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        bus.subscribe(EventKind::TasksUpdated, move |event| {
            assert_eq!(event.kind(), EventKind::TasksUpdated);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(ChangeEvent::TasksUpdated(Vec::new()));
        bus.publish(ChangeEvent::DataCleared);
        bus.publish(ChangeEvent::TasksUpdated(Vec::new()));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = bus.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(ChangeEvent::DataImported);
        assert!(bus.unsubscribe(&id));
        assert!(!bus.unsubscribe(&id));
        bus.publish(ChangeEvent::DataImported);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channel_receives_and_is_pruned_when_dropped() {
        let bus = EventBus::new();
        let (_, mut receiver) = bus.channel();

        bus.publish(ChangeEvent::ThemeChanged(Theme::Dark));
        assert_eq!(receiver.try_recv().expect("event"), ChangeEvent::ThemeChanged(Theme::Dark));

        drop(receiver);
        bus.publish(ChangeEvent::DataCleared);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_may_subscribe_while_publishing() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.subscribe(EventKind::DataImported, move |_| {
            inner.subscribe_all(|_| {});
        });

        bus.publish(ChangeEvent::DataImported);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn event_names_match_wire_names() {
        assert_eq!(ChangeEvent::DataImported.kind().as_str(), "dataImported");
        assert_eq!(EventKind::ObjectsUpdated.as_str(), "objectsUpdated");
    }
}
