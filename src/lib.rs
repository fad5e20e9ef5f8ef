//! # flowgate-web
//!
//! Administrative control panel for the `flowgate` gateway tool. A single
//! operator account manages domain/service routing entries; the core of
//! the crate is the authentication subsystem:
//!
//! - **Credentials**: one admin identity persisted as an owner-only JSON
//!   record, provisioned with a random password on first run.
//! - **Two-step login**: password (argon2id) then an optional TOTP code,
//!   modelled as an explicit state machine so illegal transitions are
//!   unrepresentable.
//! - **Sessions**: server-side state keyed by an unguessable identifier;
//!   the cookie carries only the HMAC-signed identifier.
//! - **CSRF**: a lazy per-session token gates every mutating request.
//!
//! Routing entries themselves are owned by the external gateway: the
//! panel reads its YAML config and requests mutations by shelling out to
//! the tool with validated arguments.

pub mod api;
pub mod auth;
pub mod cli;
pub mod gateway;
