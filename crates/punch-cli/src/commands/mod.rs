pub mod client;
pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod punch;
pub mod report;
pub mod sync;
