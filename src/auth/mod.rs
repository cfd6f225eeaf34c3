//! Accounts and login sessions

pub mod extract;
pub mod password;
pub mod service;
pub mod session;

pub use extract::{AdminUser, CurrentUser, SessionToken};
pub use password::{hash_password, verify_password, PasswordError};
