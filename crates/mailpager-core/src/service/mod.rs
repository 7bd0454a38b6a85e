//! Services exposed to front ends.

pub mod query;

pub use query::{MessageFilter, QueryOutcome, QueryReply, QueryRequest, QueryService};
