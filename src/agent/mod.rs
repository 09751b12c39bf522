pub mod classifier;
pub mod error;
pub mod inquiry;
pub mod issue;
pub mod pipeline;
pub mod sanitize;

pub use classifier::{classify, Intent};
pub use error::PipelineError;
pub use inquiry::{build_inquiry, MAX_HISTORY_TURNS};
pub use issue::{IssueRecord, ISSUE_FIELDS, NOT_SPECIFIED};
pub use pipeline::{ResponsePipeline, ResponseResult};
