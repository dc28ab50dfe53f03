//! Note model, coordinate transforms and interaction engine for the sticky-note board.
//!
//! This crate is pure and synchronous. It owns the client-local half of the
//! board: the note document cache, the screen/canvas coordinate transform
//! (pan, anchor-preserving zoom, fit-to-content), rectangle overlap testing
//! for drag-to-trash, and the pointer-driven mode machine. It never talks to
//! a store; input handlers return [`engine::Action`]s and the host decides
//! what to persist or publish.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Interaction state machine ([`engine::EngineCore`]) |
//! | [`doc`] | Note records, sparse patches and the in-memory note document |
//! | [`camera`] | Canvas transform and coordinate conversions |
//! | [`input`] | Pointer/keyboard event types and gesture state |
//! | [`hit`] | Screen rectangles, overlap and hit-testing |
//! | [`consts`] | Shared numeric constants (zoom limits, note footprint, thresholds) |

pub mod camera;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod hit;
pub mod input;
