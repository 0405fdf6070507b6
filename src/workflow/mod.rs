//! Guided rewrite-and-translate workflow.
//!
//! `machine` holds the synchronous state machine, `controller` drives it from
//! UI commands with backend calls running in the background, and `headless`
//! walks it start to finish without a user.

mod controller;
mod error;
mod headless;
mod machine;

pub use controller::{run_controller, Notice, NoticeKind, Snapshot, UiCommand, WorkflowEvent};
pub use error::{ValidationError, WorkflowError};
pub use headless::{run_headless, HeadlessRun, HeadlessScript};
pub use machine::{Completion, Pending, Ticket, Workflow};
