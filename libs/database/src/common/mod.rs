//! Common utilities shared across the connection layer

pub mod error;

pub use error::{DatabaseError, DatabaseResult};
