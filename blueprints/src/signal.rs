//! Progress and completion notifications of a load cycle.
//!
//! Signals are fire-and-forget: a bus with no subscribers drops them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::manager::LoadReport;

/// A notification emitted during a load cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "camelCase")]
pub enum BlueprintSignal {
    /// Cloud bundle download progress, 0 to 100.
    #[serde(rename_all = "camelCase")]
    LoadProgress { percent: f32 },

    /// Number of tables parsed so far out of the tables attempted.
    #[serde(rename_all = "camelCase")]
    ReadProgress { current: usize, max: usize },

    /// Fired exactly once at the end of every cycle, partial failures included.
    #[serde(rename_all = "camelCase")]
    LoadSucceeded { report: LoadReport },
}

/// Cloneable handle over a broadcast channel of [`BlueprintSignal`]s.
#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<BlueprintSignal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn fire(&self, signal: BlueprintSignal) {
        let _ = self.sender.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlueprintSignal> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_one_channel() {
        let bus = SignalBus::default();
        let mut rx = bus.subscribe();
        bus.clone().fire(BlueprintSignal::ReadProgress { current: 1, max: 4 });

        match rx.try_recv().unwrap() {
            BlueprintSignal::ReadProgress { current, max } => assert_eq!((current, max), (1, 4)),
            other => panic!("unexpected signal {:?}", other),
        }
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_signal_json_is_tagged() {
        let json = serde_json::to_value(BlueprintSignal::LoadProgress { percent: 50.0 }).unwrap();
        assert_eq!(json["signal"], "loadProgress");
        assert_eq!(json["percent"], 50.0);
    }
}
