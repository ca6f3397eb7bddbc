//! # analyzer-auth
//!
//! Bearer token handling for the document analyzer. Identities are issued
//! by an upstream identity provider; this crate verifies HS256 tokens and
//! exposes the subject as the owning user.
//!
//! ## Modules
//!
//! - `jwt`: claims, token validation, and token minting for tooling

pub mod jwt;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
