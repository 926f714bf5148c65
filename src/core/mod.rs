pub mod intake;
pub mod workflow;

pub use crate::domain::model::{EnrollmentOutcome, EnrollmentRequest};
pub use crate::domain::ports::{BillingProvider, NotificationSink};
pub use workflow::{EnrollmentWorkflow, WorkflowSettings};
