//! Co-occurrence statistics over a music catalog dump
//!
//! One streaming pass over a compressed hierarchical dump, three counters,
//! periodic durable checkpoints. The embedding step and the plot that consume
//! the counters live elsewhere; this crate only produces their inputs.

pub mod checkpoint;
pub mod cooccur;
pub mod errors;
pub mod xml;
