//! Core types and trait definitions for the chmail change-email workflow.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! identity directory, the site settings store and the address validator are
//! collaborators expressed as traits; `chmail-store-sqlite` and `chmail-web`
//! supply the concrete pieces.

pub mod directory;
pub mod error;
pub mod settings;
pub mod user;
pub mod validation;
pub mod workflow;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
