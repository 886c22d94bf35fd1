//! Node implementations.

pub mod data;
pub mod mixer;
pub mod processing;

pub use data::DataNode;
pub use mixer::MixerNode;
pub use processing::ProcessingNode;
