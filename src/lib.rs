//! Gridflow — server-side table queries for Rust, powered by Postgres.
//!
//! Given a DataTables-style request (page window, per-column filters and
//! sort flags, a global search, optional grouping), the engine composes
//! the SQL, runs the unfiltered and filtered counts plus the page select,
//! and returns the envelope the widget renders. Dotted column paths like
//! `customer.name` become deduplicated inner joins over a declared entity
//! model.

pub mod engine;
pub mod envelope;
mod error;
pub mod filter;
pub mod metrics;
pub mod model;
pub mod paging;
pub mod query;
pub mod request;
pub mod spec;
pub mod testing;

pub use engine::{GridEngine, GridEngineBuilder};
pub use envelope::TableResult;
pub use error::{Error, Result, WithContext};
pub use request::{SearchTerm, SortDirection, TableColumn, TableRequest};
pub use spec::{where_clause, Specification};

pub mod prelude {
    pub use crate::{
        GridEngine, Result, SearchTerm, SortDirection, Specification, TableColumn, TableRequest,
        TableResult,
    };
}
