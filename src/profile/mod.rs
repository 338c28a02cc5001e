//! User profile data model.

pub mod model;

pub use model::*;
