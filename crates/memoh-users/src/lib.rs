//! `memoh-users` — the platform account layer behind `POST /auth/login`
//!. Password hashing (argon2id) and JWT issuance/verification
//! (HS256), over the `users` table in `memoh-db`.
//!
//! Deliberately narrow: the design treats the HTTP auth surface as a thin,
//! unspecified wrapper, so this crate carries only what that wrapper needs
//! — no role/quota/content-filter profile system (the prior build's
//! `skynet-users` had one; it had no counterpart here and never even
//! compiled against the renamed workspace, so it was dropped rather than
//! migrated).

pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use error::{Result, UserError};
pub use memoh_core::types::UserId;
pub use service::{AuthService, LoginResponse};
pub use token::{Claims, TokenIssuer};
