//! HTTP interface.

pub mod checks;
pub(crate) mod monitoring;
pub mod routes;
