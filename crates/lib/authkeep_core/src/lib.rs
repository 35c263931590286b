//! # authkeep_core
//!
//! Core authentication domain logic for Authkeep: credential, refresh-token
//! and reset-token stores, and the `AuthService` orchestrating them.

pub mod auth;
pub mod clock;
pub mod config;
pub mod mail;
pub mod migrate;
pub mod models;
pub mod purge;
pub mod store;
