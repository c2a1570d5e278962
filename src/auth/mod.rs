//! Authentication for doubtdesk
//!
//! Provides:
//! - HS256 JWT access tokens and bearer extraction
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{hash_password, verify_password};
