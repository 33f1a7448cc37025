use http::Method;
use tokio::sync::broadcast;

/// Progress notification emitted around every service request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingEvent {
    pub loading: bool,
    pub method: Method,
    pub store_name: String,
    /// Unquoted entity id when the call targets a single entity
    pub entity_id: Option<String>,
}

/// Sink for loading events. Dispatch is fire and forget.
pub trait LoadingNotifier: Send + Sync {
    fn dispatch(&self, event: LoadingEvent);
}

/// [`LoadingNotifier`] fanning events out over a tokio broadcast channel.
///
/// Events sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastLoader {
    tx: broadcast::Sender<LoadingEvent>,
}

impl BroadcastLoader {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LoadingEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastLoader {
    fn default() -> Self {
        Self::new(64)
    }
}

impl LoadingNotifier for BroadcastLoader {
    fn dispatch(&self, event: LoadingEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("loading event dropped: no subscribers");
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn event(loading: bool) -> LoadingEvent {
        LoadingEvent {
            loading,
            method: Method::GET,
            store_name: "products".to_owned(),
            entity_id: Some("7".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let loader = BroadcastLoader::default();
        let mut rx = loader.subscribe();

        loader.dispatch(event(true));
        loader.dispatch(event(false));

        assert_eq!(rx.recv().await.unwrap(), event(true));
        assert_eq!(rx.recv().await.unwrap(), event(false));
    }

    #[test]
    fn test_dispatch_without_subscribers_is_silent() {
        let loader = BroadcastLoader::new(4);
        loader.dispatch(event(true));
    }
}
