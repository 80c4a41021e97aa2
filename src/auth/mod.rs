//! Bearer token handling.

pub mod jwt;

pub use jwt::{Claims, JwtConfig, JwtError};
