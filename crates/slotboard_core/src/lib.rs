//! Core of the slotboard extension host.
//! Slot registry, renderer, module loader and event bus live here; hosts
//! supply the UI layer and the module list.

pub mod config;
pub mod extension;
pub mod logging;

pub use config::{ConfigError, HostConfig};
pub use extension::contribution::{
    Contribution, Props, RegisterOptions, DEFAULT_CONTRIBUTION_ORDER, RESERVED_CONTEXT_PROP,
};
pub use extension::event_bus::{
    EmitReport, EventBus, EventHandler, Subscription, WeakEventBus,
};
pub use extension::loader::{
    FnModule, LoadReport, LoadedModule, ModuleCapabilities, ModuleInitError, ModuleList,
    ModuleLoadError, ModuleLoadFailure, ModuleLoader, SlotModule,
};
pub use extension::renderer::{
    render_slot, RenderProps, Rendered, RenderedContribution, SlotComponent, SlotRenderer,
};
pub use extension::slot_registry::{Registration, RegistryError, SlotRegistry, SlotSnapshot};
pub use logging::{default_log_level, init_logging, logging_status};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
