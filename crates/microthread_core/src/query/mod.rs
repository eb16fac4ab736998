//! Statement rendering and listing input normalization.
//!
//! # Responsibility
//! - Render the fixed select/insert/update/delete shapes with named placeholders.
//! - Encode and decode composite aggregate columns.
//! - Normalize paging and identifier input.

pub mod aggregate;
pub mod builder;
pub mod filter;
pub mod select;

pub use aggregate::{parse_aggregate, render_aggregate, AggregateMap};
pub use builder::{
    aggregate_field, delete_statement, filter_identifier, in_clause, insert_statement,
    set_params, update_statement, Fields, Mode, Statement,
};
pub use filter::{like_pattern, normalize, Filter, RawFilter, PAGE_LIMIT};
pub use select::SelectQuery;
