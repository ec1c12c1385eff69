//! Shared test fixtures for Bavet crates.
//!
//! This crate provides a fact type and brute-force reference calculations.
//! It does NOT depend on `bavet-network`, so the network's own tests can
//! compare incremental results against these from-scratch answers.
//!
//! - [`model`] - the `Model` fact enum used across tests
//! - [`scheduling`] - reference scores for a small shift-scheduling model
//! - [`roster`] - reference scores for a roster built on collectors and
//!   reshaping streams
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! bavet-test = { workspace = true }
//! ```

pub mod model;
pub mod roster;
pub mod scheduling;

pub use model::Model;
