//! Compiles a [`crate::query::Query`] into dialect SQL.
//!
//! Each projected column resolves to a [`Fragment`]; fragments merge into a
//! [`SqlQueryTemplate`]; [`QueryConstructor`] turns the template plus the
//! query's filters, sorting and pagination into rendered statements.

mod components;
mod filters;
mod plan;
mod planner;
mod resolve;

pub use components::{Fragment, SqlQueryTemplate};
pub use plan::CompiledQuery;
pub use planner::{QueryConstructor, PAGE_TOTALS_ALIAS};
