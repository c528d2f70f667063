//! Evaluation pipeline
//!
//! - [`query`] - Columns, key qualifiers and the query itself
//! - [`row`] - Result rows and column projection
//! - [`policy`] - Timeout and retry applied to every remote call
//! - [`streamer`] - Ordered delivery of rows to the caller, cancellation
//! - [`driver`] - The [`Evaluator`] tying regions, listing and hydration together

pub mod driver;
pub mod policy;
pub mod query;
pub mod row;
pub mod streamer;

pub use driver::{EvalError, EvalSummary, Evaluator};
pub use policy::CallPolicy;
pub use query::{parse_columns, Column, KeyQuals, Query};
pub use row::Row;
pub use streamer::{Stopped, Streamer};
