// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Username/password login issuing HS256 tokens, and role checks for the
//! portal API.
//!
//! ## Auth Flow
//!
//! 1. Client posts credentials to `POST /api/auth/login`
//! 2. Server verifies the bcrypt hash and returns a signed token
//! 3. Client sends `Authorization: Bearer <token>`
//! 4. Extractors verify the token, then load the user row:
//!    - `sub` → canonical `user_id`
//!    - role and department from the row, so changes apply immediately
//!
//! ## Security
//!
//! - All non-health endpoints except login and `/ws` require authentication
//! - Deactivated users are rejected even with an unexpired token
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod token;

pub use claims::{AuthenticatedUser, PortalClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, Writer};
pub use roles::Role;
pub use token::{issue_token, verify_token, IssuedToken};
