// handlers/public/mod.rs - Endpoints that need no token

pub mod auth;
pub mod system;

pub use system::{health, root};
