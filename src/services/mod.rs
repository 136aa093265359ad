pub mod code_extractor;
pub mod context_builder;
pub mod context_policy;
pub mod context_truncation;
pub mod result_comparator;
pub mod retry_controller;
pub mod statement_refiner;
pub mod verification;

pub use code_extractor::extract_code;
pub use context_builder::ContextBuilder;
pub use context_policy::ContextPolicy;
pub use result_comparator::ResultComparator;
pub use retry_controller::{
    AbortReason, RetryController, RunEvent, RunOutcome, RunReport, RunState,
};
pub use statement_refiner::StatementRefiner;
pub use verification::{verify_source, Verification};
