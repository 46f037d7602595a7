pub mod batch;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod processor;
pub mod prompt;
pub mod redaction;
pub mod rtf;
pub mod sanitize;
pub mod store;
pub mod tokens;

pub use batch::{run_batch, AdmissionReport, BatchReport};
pub use error::PipelineError;
pub use processor::{AdmissionJob, AdmissionProcessor};
pub use store::{LetterStore, SaveOutcome, SqliteLetterStore};
