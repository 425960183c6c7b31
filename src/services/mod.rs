//! Services: the store client seam, the object snapshot, the overwrite
//! orchestrator and an in-memory store implementing the seam.

pub mod memory_store;
pub mod overwrite_service;
pub mod snapshot;
pub mod store_client;
