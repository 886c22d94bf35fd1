//! MixerNode: structural merge point for fan-in.

use crate::pipeline::payload::Payload;

/// Merges every payload delivered to it in a run into one.
///
/// Merge policy: start empty and apply the inputs in delivery order; later
/// keys overwrite earlier ones. The executor establishes delivery order from
/// connection order, so the result is deterministic.
#[derive(Debug, Clone)]
pub struct MixerNode {
    name: String,
}

impl MixerNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn merge<'a>(&self, inputs: impl IntoIterator<Item = &'a Payload>) -> Payload {
        inputs
            .into_iter()
            .fold(Payload::new(), |mut merged, payload| {
                merged.merge_from(payload);
                merged
            })
    }
}
