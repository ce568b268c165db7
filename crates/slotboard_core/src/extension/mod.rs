//! Runtime UI extension contracts.
//!
//! Modules contribute components into named slots through the registry; the
//! host renders slots at its mount points and modules talk through the event
//! bus. Nothing here is global: hosts construct and inject every instance.

pub mod contribution;
pub mod event_bus;
pub mod loader;
pub mod renderer;
pub mod slot_registry;
