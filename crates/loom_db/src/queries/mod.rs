//! SQL queries, grouped by domain.

pub mod deployments;
pub mod templates;
pub mod variables;
