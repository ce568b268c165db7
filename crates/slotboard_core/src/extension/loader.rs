//! Module initialization pass.
//!
//! # Responsibility
//! - Run every host-listed module's `init` once, in list order.
//! - Hand each module a registration capability bound to the shared registry.
//!
//! # Invariants
//! - One module's failure (error or panic) never stops later modules.
//! - A module with a blank or repeated id is not initialized.
//! - Re-running a load pass over the same modules adds no duplicates, as
//!   long as modules register with stable contribution ids.

use crate::extension::contribution::RegisterOptions;
use crate::extension::slot_registry::{Registration, RegistryError, SlotRegistry};
use crate::logging::describe_panic_payload;
use log::{debug, error, info, warn};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Host-listed module contributing into slots.
pub trait SlotModule<C: ?Sized> {
    /// Stable module id, e.g. `dashboard.student`.
    fn id(&self) -> &str;

    fn init(&self, capabilities: &ModuleCapabilities<'_, C>) -> Result<(), ModuleInitError>;
}

/// Ordered module list supplied by the host.
pub type ModuleList<C> = Vec<Box<dyn SlotModule<C> + Send + Sync>>;

/// Capabilities handed to one module during `init`.
pub struct ModuleCapabilities<'a, C: ?Sized> {
    module_id: &'a str,
    registry: &'a SlotRegistry<C>,
    inserted: Cell<usize>,
}

impl<'a, C: ?Sized> ModuleCapabilities<'a, C> {
    fn new(module_id: &'a str, registry: &'a SlotRegistry<C>) -> Self {
        Self {
            module_id,
            registry,
            inserted: Cell::new(0),
        }
    }

    pub fn module_id(&self) -> &str {
        self.module_id
    }

    /// Registers one contribution on behalf of the calling module.
    pub fn register_component(
        &self,
        slot_name: impl Into<String>,
        component: Arc<C>,
        options: RegisterOptions,
    ) -> Result<Registration, RegistryError> {
        let slot_name = slot_name.into();
        let outcome = self
            .registry
            .register_component(slot_name.as_str(), component, options)
            .inspect_err(|err| {
                warn!(
                    "event=module_register module=loader status=error module_id={} slot={} error={}",
                    self.module_id, slot_name, err
                );
            })?;
        if outcome.changed() {
            self.inserted.set(self.inserted.get() + 1);
        }
        Ok(outcome)
    }
}

/// Failure reported by a module's `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleInitError {
    Failed(String),
    Registration(RegistryError),
    Panicked(String),
}

impl ModuleInitError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl Display for ModuleInitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(message) => write!(f, "module init failed: {message}"),
            Self::Registration(err) => write!(f, "module registration rejected: {err}"),
            Self::Panicked(message) => write!(f, "module init panicked: {message}"),
        }
    }
}

impl Error for ModuleInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registration(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for ModuleInitError {
    fn from(value: RegistryError) -> Self {
        Self::Registration(value)
    }
}

/// Why a module was not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLoadError {
    InvalidModuleId(String),
    DuplicateModuleId(String),
    Init(ModuleInitError),
}

impl Display for ModuleLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidModuleId(value) => write!(f, "module id is invalid: {value:?}"),
            Self::DuplicateModuleId(value) => write!(f, "module id listed twice: {value}"),
            Self::Init(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModuleLoadError {}

/// One module that failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLoadFailure {
    pub module_id: String,
    pub error: ModuleLoadError,
}

/// One module that finished `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub module_id: String,
    /// Contributions that changed registry state during this pass.
    pub inserted: usize,
}

/// Summary of one load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<LoadedModule>,
    pub failures: Vec<ModuleLoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn loaded_ids(&self) -> Vec<&str> {
        self.loaded
            .iter()
            .map(|module| module.module_id.as_str())
            .collect()
    }

    pub fn inserted_total(&self) -> usize {
        self.loaded.iter().map(|module| module.inserted).sum()
    }
}

/// Runs module `init` functions against one registry.
pub struct ModuleLoader<'r, C: ?Sized> {
    registry: &'r SlotRegistry<C>,
}

impl<'r, C: ?Sized> ModuleLoader<'r, C> {
    pub fn new(registry: &'r SlotRegistry<C>) -> Self {
        Self { registry }
    }

    /// Initializes `modules` sequentially, in order.
    pub fn load(&self, modules: &[Box<dyn SlotModule<C> + Send + Sync>]) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen = BTreeSet::new();

        for module in modules {
            let module_id = module.id().trim();
            if module_id.is_empty() {
                record_failure(
                    &mut report,
                    module_id,
                    ModuleLoadError::InvalidModuleId(module.id().to_string()),
                );
                continue;
            }
            if !seen.insert(module_id.to_string()) {
                record_failure(
                    &mut report,
                    module_id,
                    ModuleLoadError::DuplicateModuleId(module_id.to_string()),
                );
                continue;
            }

            let capabilities = ModuleCapabilities::new(module_id, self.registry);
            let outcome = catch_unwind(AssertUnwindSafe(|| module.init(&capabilities)))
                .unwrap_or_else(|payload| {
                    Err(ModuleInitError::Panicked(describe_panic_payload(&*payload)))
                });

            match outcome {
                Ok(()) => {
                    let inserted = capabilities.inserted.get();
                    debug!(
                        "event=module_init module=loader status=ok module_id={} inserted={}",
                        module_id, inserted
                    );
                    report.loaded.push(LoadedModule {
                        module_id: module_id.to_string(),
                        inserted,
                    });
                }
                Err(err) => record_failure(&mut report, module_id, ModuleLoadError::Init(err)),
            }
        }

        info!(
            "event=modules_loaded module=loader status={} loaded={} failed={} inserted={}",
            if report.is_clean() { "ok" } else { "degraded" },
            report.loaded.len(),
            report.failures.len(),
            report.inserted_total()
        );
        report
    }
}

fn record_failure(report: &mut LoadReport, module_id: &str, error: ModuleLoadError) {
    error!(
        "event=module_init module=loader status=error module_id={} error={}",
        module_id, error
    );
    report.failures.push(ModuleLoadFailure {
        module_id: module_id.to_string(),
        error,
    });
}

/// Module built from an id and an init closure.
pub struct FnModule<C: ?Sized, F> {
    id: String,
    init: F,
    _component: PhantomData<fn(&C)>,
}

impl<C: ?Sized, F> FnModule<C, F>
where
    F: Fn(&ModuleCapabilities<'_, C>) -> Result<(), ModuleInitError>,
{
    pub fn new(id: impl Into<String>, init: F) -> Self {
        Self {
            id: id.into(),
            init,
            _component: PhantomData,
        }
    }
}

impl<C: ?Sized, F> SlotModule<C> for FnModule<C, F>
where
    F: Fn(&ModuleCapabilities<'_, C>) -> Result<(), ModuleInitError>,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn init(&self, capabilities: &ModuleCapabilities<'_, C>) -> Result<(), ModuleInitError> {
        (self.init)(capabilities)
    }
}
