//! Shared helpers for the Easel document engines.
//!
//! Both backends lean on the same primitives: fresh element/cell ids,
//! random seeds and version nonces, millisecond timestamps, and the
//! loose-JSON coercion helpers the scene normalizer is built from.

pub mod coerce;
pub mod ids;

pub use coerce::*;
pub use ids::*;
