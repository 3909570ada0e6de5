//! Ilia Portal Core - Shared domain types.
//!
//! This crate provides the types shared by every part of the portal:
//! - `admin` - The portal web server and administrative console
//! - `integration-tests` - End-to-end tests against the in-memory backend
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no async. Persistence lives behind the backend collaborator in
//! the admin crate.
//!
//! # Modules
//!
//! - [`types`] - Identity, profile, role, news and directory paging types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
