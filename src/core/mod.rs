//! Core processing modules
//!
//! Selection text cleanup and AI explanations.

pub mod explain;
pub mod text;
