//! Shared data model for the huddle client: identifiers, stored records,
//! remote operation payloads and the paginated query contract.

pub mod api;
pub mod models;
pub mod query;

pub use models::*;
