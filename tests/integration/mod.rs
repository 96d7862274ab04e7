//! Integration tests for ddxgen

mod batch_runner;
mod workflow_merge;
