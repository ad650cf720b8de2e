//! Small helpers shared by the adapters.

pub mod json_path;

pub use json_path::PathMapper;
