//! Command handlers.
//!
//! Each handler takes the composed [`CliContext`](crate::CliContext) and
//! prints its own output.

pub mod catalog;
pub mod download;
pub mod load;
pub mod size;
