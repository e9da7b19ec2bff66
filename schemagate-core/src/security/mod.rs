//! Security primitives of the dynamic engine
//!
//! ## Security Features
//! - **Hashed fields**: Argon2id, compared only through verification
//! - **Session tokens**: HMAC-SHA256 JWTs with constant-time signature checks
//! - **Cookies**: HttpOnly, Secure, cross-site capable by default

mod cookie;
pub mod password;
mod token;

pub use cookie::{CookieConfig, SameSitePolicy, TokenCookie};
pub use password::{FieldHasher, HashError};
pub use token::{Claims, IssuedToken, TokenError, TokenIssuer};
