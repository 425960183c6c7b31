//! Data models for attribute-preserving overwrites.
//!
//! These types describe an object as the store reports it, the access-control
//! and tagging attributes that must survive an overwrite, the request shapes
//! sent back to the store, and the decision a transform returns.

pub mod acl;
pub mod decision;
pub mod object;
pub mod request;
pub mod tagging;
