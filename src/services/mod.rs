pub mod account_service;
pub mod resource_service;

pub use account_service::{AccountService, LoginResult};
pub use resource_service::{Outcome, ResourceService, ServiceError};
