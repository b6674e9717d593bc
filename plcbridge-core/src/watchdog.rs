//! Process-state watchdog driving the adaptive poll cadence.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use plcbridge_types::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::timing::{Cadence, PollTiming};

/// A status-change notification from the sampling collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    /// Address of the node that changed.
    pub node: String,
    pub value: Value,
}

impl StatusEvent {
    pub fn new(node: impl Into<String>, value: Value) -> Self {
        Self {
            node: node.into(),
            value,
        }
    }
}

/// Derives running/stopped from status values and sets the poll cadence.
///
/// Every notification re-applies the rule; there is no hysteresis, so a
/// flapping status signal makes the interval flap with it.
#[derive(Debug)]
pub struct Watchdog {
    timing: Arc<PollTiming>,
    last_values: Mutex<HashMap<String, Value>>,
}

impl Watchdog {
    pub fn new(timing: Arc<PollTiming>) -> Self {
        Self {
            timing,
            last_values: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one status notification and return the cadence it selected.
    pub fn notify(&self, node: &str, value: &Value) -> Cadence {
        let first = {
            let mut last_values = self.last_values.lock();
            last_values.insert(node.to_string(), value.clone()).is_none()
        };

        let cadence = if value.is_zero() {
            Cadence::Normal
        } else {
            Cadence::Fast
        };

        if first {
            info!(%node, %value, ?cadence, "first status notification");
        } else {
            debug!(%node, %value, ?cadence, "status notification");
        }

        self.timing.switch_to(cadence);
        cadence
    }

    /// Last value observed for a node.
    pub fn last_value(&self, node: &str) -> Option<Value> {
        self.last_values.lock().get(node).cloned()
    }

    /// Consume notifications until every sender is gone.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<StatusEvent>) {
        while let Some(event) = events.recv().await {
            self.notify(&event.node, &event.value);
        }
        debug!("status notification channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn watchdog() -> (Arc<PollTiming>, Arc<Watchdog>) {
        let timing = Arc::new(PollTiming::new(Duration::from_secs(5), Duration::from_secs(1)));
        let watchdog = Arc::new(Watchdog::new(timing.clone()));
        (timing, watchdog)
    }

    #[test]
    fn nonzero_value_selects_fast_cadence() {
        let (timing, watchdog) = watchdog();
        assert_eq!(watchdog.notify("ns=2;i=4", &Value::Int(5)), Cadence::Fast);
        assert_eq!(timing.current(), Duration::from_secs(1));
    }

    #[test]
    fn zero_value_selects_normal_cadence_regardless_of_prior_state() {
        let (timing, watchdog) = watchdog();
        watchdog.notify("ns=2;i=4", &Value::Int(5));
        timing.set_interval(Duration::from_secs(42));

        assert_eq!(watchdog.notify("ns=2;i=4", &Value::Int(0)), Cadence::Normal);
        assert_eq!(timing.current(), Duration::from_secs(5));
    }

    #[test]
    fn first_notification_is_applied() {
        let (timing, watchdog) = watchdog();
        assert!(watchdog.last_value("ns=2;i=4").is_none());

        watchdog.notify("ns=2;i=4", &Value::Bool(true));
        assert_eq!(timing.current(), timing.fast());
        assert_eq!(watchdog.last_value("ns=2;i=4"), Some(Value::Bool(true)));
    }

    #[test]
    fn oscillation_is_followed() {
        let (timing, watchdog) = watchdog();
        for v in [1, 0, 1, 0, 1] {
            watchdog.notify("n", &Value::Int(v));
        }
        assert_eq!(timing.current(), timing.fast());
    }

    #[tokio::test]
    async fn run_consumes_channel() {
        let (timing, watchdog) = watchdog();
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(watchdog.clone().run(rx));

        tx.send(StatusEvent::new("a", Value::Int(1))).await.unwrap();
        tx.send(StatusEvent::new("b", Value::Int(0))).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(timing.current(), timing.normal());
        assert_eq!(watchdog.last_value("a"), Some(Value::Int(1)));
        assert_eq!(watchdog.last_value("b"), Some(Value::Int(0)));
    }
}
