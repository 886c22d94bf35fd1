//! DataNode: static payload source, pass-through, and sink.
//!
//! With no incoming payload it emits its fixed payload. Mid-graph it acts as
//! a pass-through: incoming keys override fixed keys on collision. The graph
//! appends every payload the node emitted to its history once a run succeeds;
//! history persists across runs until cleared.

use crate::pipeline::payload::Payload;

#[derive(Debug, Clone)]
pub struct DataNode {
    name: String,
    data: Option<Payload>,
    history: Vec<Payload>,
}

impl DataNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            history: Vec::new(),
        }
    }

    /// Set the fixed payload.
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    /// Payloads emitted so far, oldest first.
    pub fn history(&self) -> &[Payload] {
        &self.history
    }

    pub(crate) fn record(&mut self, payload: Payload) {
        self.history.push(payload);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn process(&self, incoming: Option<&Payload>) -> Payload {
        match (&self.data, incoming) {
            (Some(data), Some(incoming)) => data.merged_with(incoming),
            (Some(data), None) => data.clone(),
            (None, Some(incoming)) => incoming.clone(),
            (None, None) => Payload::new(),
        }
    }
}
