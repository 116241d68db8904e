pub mod error;
pub mod health;
pub mod token;
pub mod types;
pub mod user;

pub use self::error::ApiError;
