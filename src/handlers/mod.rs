// handlers/mod.rs - Two-tier handler layout
//
// Public (no token required) and protected (caller resolved from the bearer
// token by `middleware::caller_middleware`). Protected handlers never reject
// anonymous callers themselves; the authorization check decides per entity.
pub mod protected;
pub mod public;
