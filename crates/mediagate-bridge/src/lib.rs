//! mediagate Bridge Library
//!
//! Reconciles an embedded web surface's camera/microphone requests with the
//! host OS permission prompt flow:
//! - Live OS permission checks
//! - Single-slot pending authorization registry
//! - Authorization coordinator with prompt timeout recovery
//! - OS result channel for out-of-band prompt callbacks
//! - Web layer adapter and OS backends

pub mod permission;
pub mod platform;
pub mod web;
