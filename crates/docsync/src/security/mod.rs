//! Security utilities

pub mod api_key;
pub mod validator;

pub use self::api_key::*;
pub use self::validator::*;
