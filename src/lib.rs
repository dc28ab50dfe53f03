//! Stickyboard: the synchronization core of a collaborative sticky-note board.
//!
//! SYSTEM CONTEXT
//! ==============
//! The pure interaction and geometry engine lives in the [`canvas`] crate.
//! This crate connects it to shared state:
//!
//! - [`store`]: the document store capability with remote and local backends.
//! - [`services`]: advisory edit locks, presence heartbeat, cursor broadcast.
//! - [`session`]: the facade a hosting UI drives.
//! - [`storage`], [`identity`], [`config`], [`notify`]: local persistence,
//!   the local user, environment configuration and user-facing notices.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod notify;
pub mod records;
pub mod services;
pub mod session;
pub mod storage;
pub mod store;
pub mod validate;

pub use canvas;
