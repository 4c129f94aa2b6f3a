//! # Infrastructure Layer
//!
//! Adapters for the broker and the database.

pub mod messaging;
pub mod persistence;
