//! Authorization consent decision engine for an OpenID Connect identity provider.
//!
//! Sits between the authentication layer, which establishes who the user is
//! and at what level, and the issuance layer, which only acts on a resolved
//! consent session.

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod logging;
pub mod oauth2;
pub mod storage;
