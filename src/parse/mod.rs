//! Document parse jobs.
//!
//! A file moves `pending -> in_progress -> completed`, or back to `pending`
//! when an attempt fails. `ParseService` performs the trigger and read
//! operations; `JobDispatcher` runs accepted attempts in the background.

mod dispatcher;
mod error;
mod job;
mod service;

pub use dispatcher::{EnqueueError, JobDispatcher, JobQueue};
pub use error::ParseError;
pub use job::{JobOutcome, ParseEvent, ParseJob, ParseJobRunner};
pub use service::{ParseService, ParseStatus, TriggerReceipt};
