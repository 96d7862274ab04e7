//! ddxgen: Resumable Differential Diagnosis Generation
//!
//! Runs a structured-output generation step over every case in a tabular dataset, one case at
//! a time, checkpointing each success to an append-only CSV so interrupted runs resume where
//! they stopped. Providers (OpenAI, DeepSeek R1 via Fireworks, Gemini) plug in through a static
//! registry; results are renamed per provider and left-joined back onto the input.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod store;
