//! Database models split into domain-specific modules.

pub mod sale;
pub mod user;

pub use sale::*;
pub use user::*;
