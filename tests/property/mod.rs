//! Property-based tests for checkpointing and merge guarantees

mod checkpoint_properties;
mod merge_properties;
