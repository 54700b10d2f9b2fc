pub mod fetch_workflow;

pub use fetch_workflow::{FetchEvent, FetchWorkflow};
