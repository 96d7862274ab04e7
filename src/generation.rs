//! Case generation: resumable batch execution, result merging, and the single workflow entry
//! point. Providers stay in their own domain; this module only drives them.

pub mod executor;
pub mod merge;
pub mod result;
pub mod run;

pub use executor::{BackoffPolicy, BatchConfig, BatchReport, BatchRunner};
pub use merge::{merge_results, rename_result_columns, MergedTable};
pub use result::{CaseGenerator, GenerationResult};
pub use run::{execute_generation, run_generation, GenerateRequest, GenerationOutcome};
