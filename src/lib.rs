//! Bookshelf application library
//!
//! Wires the book catalog module onto the bookshelf framework crates.

pub mod app;
pub mod modules;
pub mod serializer;
pub mod validation;

pub use app::{build, migrate, seed, serve, Application};
