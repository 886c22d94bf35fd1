//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use layerpipe::pipeline::{Payload, Value, PASSTHROUGH};

/// Payload carrying a single integer under `passthrough`
pub fn passthrough(value: i64) -> Payload {
    Payload::from([(PASSTHROUGH, value)])
}

/// Integer `passthrough` of a payload, panicking with context otherwise
pub fn passthrough_of(payload: &Payload) -> i64 {
    match payload.get(PASSTHROUGH) {
        Some(Value::Int(v)) => *v,
        other => panic!("expected integer passthrough, got {:?} in {}", other, payload),
    }
}

/// Path of a file shipped in `demos/`
pub fn demo_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
}
