//! Per-node observation side channel.
//!
//! Every node invocation during a run produces exactly one [`NodeEvent`],
//! handed to the graph's [`RunObserver`]. Observers never influence control
//! flow.

use crate::pipeline::id::{LayerId, NodeId};
use crate::pipeline::node::NodeKind;
use crate::pipeline::payload::Payload;
use crossbeam_channel::Sender;
use serde::Serialize;

/// One node invocation: what went in and what came out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeEvent {
    pub layer: LayerId,
    pub node: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Inputs in the order they were applied; empty at the entry of a run.
    pub inputs: Vec<Payload>,
    pub output: Payload,
}

#[cfg_attr(test, mockall::automock)]
pub trait RunObserver: Send {
    fn record(&self, event: &NodeEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn record(&self, _event: &NodeEvent) {}
}

/// Emits one `info` record per node invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn record(&self, event: &NodeEvent) {
        let input = match event.inputs.as_slice() {
            [] => "{}".to_string(),
            [single] => single.to_string(),
            many => many
                .iter()
                .map(Payload::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        };
        tracing::info!(
            layer = %event.layer,
            kind = %event.kind,
            "Processing node '{}' with data {} -> {}",
            event.name,
            input,
            event.output
        );
    }
}

/// Forwards events over a channel. A disconnected receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<NodeEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<NodeEvent>) -> Self {
        Self { tx }
    }
}

impl RunObserver for ChannelObserver {
    fn record(&self, event: &NodeEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn event(name: &str) -> NodeEvent {
        NodeEvent {
            layer: LayerId(0),
            node: NodeId(1),
            name: name.to_string(),
            kind: NodeKind::Data,
            inputs: Vec::new(),
            output: Payload::from([("passthrough", 10)]),
        }
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (tx, rx) = unbounded();
        let observer = ChannelObserver::new(tx);
        observer.record(&event("Input"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.name, "Input");
        assert_eq!(received.output, Payload::from([("passthrough", 10)]));
    }

    #[test]
    fn test_channel_observer_ignores_disconnect() {
        let (tx, rx) = unbounded();
        drop(rx);
        ChannelObserver::new(tx).record(&event("Input"));
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_value(event("Input")).unwrap();
        assert_eq!(json["kind"], "data");
        assert_eq!(json["layer"], 0);
        assert_eq!(json["output"]["passthrough"], 10);
    }
}
