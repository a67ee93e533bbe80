//! Payload data store: append-only, per-payload sample buffers with
//! schema-described record layouts.

pub mod schema;
pub mod store;

pub use schema::PayloadSchema;
pub use store::{payload_fprint, PayloadStore};
