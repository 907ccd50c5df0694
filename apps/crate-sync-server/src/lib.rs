//! Crate Sync Server Library
//!
//! Change-log synchronization for multi-device DJ libraries. The binary in
//! main.rs wires these modules together; integration tests drive
//! [`routes::app`] directly.
//!
//! # Modules
//!
//! - `sync`: change record, stores and the push/pull service
//! - `db`: backend selection and schema for the durable stores
//! - `routes`: HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod sync;
