//! SQL generation for the canonical schema.
//!
//! Each [`Dialect`] supplies a [`SqlGenerator`] that renders tables,
//! indexes, views, routines and triggers as that dialect's DDL.

pub mod ddl;
pub mod dialect;
pub mod sql;
pub mod traits;


pub use dialect::Dialect;
pub use traits::SqlGenerator;
