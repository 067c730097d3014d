pub mod calculations;
pub mod models;

pub use calculations::{Pipeline, PipelineError, PipelineOutput};
pub use models::*;
