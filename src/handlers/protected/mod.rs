// handlers/protected/mod.rs - Resource endpoints under /api
pub mod auth;
pub mod data;
