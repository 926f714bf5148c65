pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::AppConfig;
pub use crate::core::{EnrollmentOutcome, EnrollmentRequest, EnrollmentWorkflow, WorkflowSettings};
pub use utils::error::{EnrollError, Result};
