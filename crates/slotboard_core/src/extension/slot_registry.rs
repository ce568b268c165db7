//! Slot registry: `slot_name -> ordered contribution list`.
//!
//! # Responsibility
//! - Own every slot contribution and keep each slot sorted for rendering.
//! - Hand out immutable snapshots; never expose internal mutable storage.
//!
//! # Invariants
//! - Within one slot, contribution ids are unique.
//! - Slot order is ascending `order`, ties broken by insertion sequence.
//! - Registering an existing `(slot_name, id)` is a no-op; the first wins.
//! - Internal lock is never held while caller code runs.

use crate::extension::contribution::{
    generate_contribution_id, Contribution, RegisterOptions, DEFAULT_CONTRIBUTION_ORDER,
};
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Immutable ordered view of one slot at the time it was read.
pub type SlotSnapshot<C> = Arc<[Contribution<C>]>;

/// Outcome of one registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new contribution was added.
    Inserted { id: String },
    /// The `(slot_name, id)` pair already existed; nothing changed.
    AlreadyRegistered { id: String },
    /// An existing contribution was updated in place.
    Replaced { id: String },
}

impl Registration {
    pub fn id(&self) -> &str {
        match self {
            Self::Inserted { id } | Self::AlreadyRegistered { id } | Self::Replaced { id } => id,
        }
    }

    /// Returns whether the registry state changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::AlreadyRegistered { .. })
    }
}

/// Register-time caller errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidContributionId(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidContributionId(value) => {
                write!(f, "contribution id must not be blank: {value:?}")
            }
        }
    }
}

impl Error for RegistryError {}

struct RegistryState<C: ?Sized> {
    slots: BTreeMap<String, SlotSnapshot<C>>,
    next_seq: u64,
}

/// In-process slot registry shared by the host and its modules.
pub struct SlotRegistry<C: ?Sized> {
    state: Mutex<RegistryState<C>>,
    default_order: i32,
}

impl<C: ?Sized> Default for SlotRegistry<C> {
    fn default() -> Self {
        Self::with_default_order(DEFAULT_CONTRIBUTION_ORDER)
    }
}

impl<C: ?Sized> Debug for SlotRegistry<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let slots: BTreeMap<&str, usize> = state
            .slots
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.len()))
            .collect();
        f.debug_struct("SlotRegistry")
            .field("slots", &slots)
            .field("default_order", &self.default_order)
            .finish()
    }
}

impl<C: ?Sized> SlotRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry applying `order` when options omit one.
    pub fn with_default_order(order: i32) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                slots: BTreeMap::new(),
                next_seq: 0,
            }),
            default_order: order,
        }
    }

    pub fn default_order(&self) -> i32 {
        self.default_order
    }

    /// Registers one contribution into `slot_name`.
    ///
    /// # Contract
    /// - Missing `options.id` is replaced by a generated UUID.
    /// - Existing `(slot_name, id)` returns `AlreadyRegistered` and keeps the
    ///   first registration, even if component or props differ.
    /// - Empty `slot_name` is a valid key.
    ///
    /// # Errors
    /// - `InvalidContributionId` when a supplied id is blank.
    pub fn register_component(
        &self,
        slot_name: impl Into<String>,
        component: Arc<C>,
        options: RegisterOptions,
    ) -> Result<Registration, RegistryError> {
        let slot_name = slot_name.into();
        let id = resolve_id(options.id)?;
        let order = options.order.unwrap_or(self.default_order);

        let mut state = self.lock();
        let mut entries = match state.slots.get(&slot_name) {
            Some(current) if current.iter().any(|entry| entry.id == id) => {
                debug!(
                    "event=slot_register module=registry status=duplicate slot={} id={}",
                    slot_name, id
                );
                return Ok(Registration::AlreadyRegistered { id });
            }
            Some(current) => current.to_vec(),
            None => Vec::new(),
        };

        let seq = state.next_seq;
        state.next_seq += 1;
        entries.push(Contribution {
            id: id.clone(),
            slot_name: slot_name.clone(),
            component,
            order,
            props: options.props,
            seq,
        });
        sort_entries(&mut entries);

        debug!(
            "event=slot_register module=registry status=ok slot={} id={} order={} slot_len={}",
            slot_name,
            id,
            order,
            entries.len()
        );
        state.slots.insert(slot_name, Arc::from(entries));
        Ok(Registration::Inserted { id })
    }

    /// Updates an existing contribution in place, or inserts it when absent.
    ///
    /// An updated entry keeps its original insertion sequence, so ties with
    /// equal order resolve as if it had never been re-registered.
    pub fn replace_component(
        &self,
        slot_name: impl Into<String>,
        component: Arc<C>,
        options: RegisterOptions,
    ) -> Result<Registration, RegistryError> {
        let slot_name = slot_name.into();
        let id = resolve_id(options.id)?;
        let order = options.order.unwrap_or(self.default_order);

        let mut state = self.lock();
        let mut entries = state
            .slots
            .get(&slot_name)
            .map(|current| current.to_vec())
            .unwrap_or_default();

        let outcome = match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let entry = &mut entries[index];
                entry.component = component;
                entry.order = order;
                entry.props = options.props;
                Registration::Replaced { id: id.clone() }
            }
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                entries.push(Contribution {
                    id: id.clone(),
                    slot_name: slot_name.clone(),
                    component,
                    order,
                    props: options.props,
                    seq,
                });
                Registration::Inserted { id: id.clone() }
            }
        };
        sort_entries(&mut entries);

        debug!(
            "event=slot_replace module=registry status=ok slot={} id={} order={} changed={}",
            slot_name,
            id,
            order,
            outcome.changed()
        );
        state.slots.insert(slot_name, Arc::from(entries));
        Ok(outcome)
    }

    /// Removes the contribution `id` from `slot_name`.
    ///
    /// Returns `false` when the slot or id is unknown.
    pub fn unregister_component(&self, slot_name: &str, id: &str) -> bool {
        let id = id.trim();
        let mut state = self.lock();
        let Some(current) = state.slots.get(slot_name) else {
            return false;
        };
        if !current.iter().any(|entry| entry.id == id) {
            return false;
        }

        let remaining: Vec<Contribution<C>> = current
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        if remaining.is_empty() {
            state.slots.remove(slot_name);
        } else {
            state.slots.insert(slot_name.to_string(), Arc::from(remaining));
        }

        debug!(
            "event=slot_unregister module=registry status=ok slot={} id={}",
            slot_name, id
        );
        true
    }

    /// Returns the current ordered contributions of `slot_name`.
    ///
    /// Unknown slots yield an empty snapshot.
    pub fn get_slot(&self, slot_name: &str) -> SlotSnapshot<C> {
        self.lock()
            .slots
            .get(slot_name)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Returns sorted names of non-empty slots.
    pub fn slot_names(&self) -> Vec<String> {
        self.lock().slots.keys().cloned().collect()
    }

    pub fn contains(&self, slot_name: &str, id: &str) -> bool {
        let id = id.trim();
        self.lock()
            .slots
            .get(slot_name)
            .is_some_and(|entries| entries.iter().any(|entry| entry.id == id))
    }

    /// Total number of contributions across all slots.
    pub fn len(&self) -> usize {
        self.lock().slots.values().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// Drops every contribution of `slot_name`, returning how many were removed.
    pub fn clear_slot(&self, slot_name: &str) -> usize {
        let removed = self
            .lock()
            .slots
            .remove(slot_name)
            .map(|entries| entries.len())
            .unwrap_or(0);
        if removed > 0 {
            info!(
                "event=slot_clear module=registry status=ok slot={} removed={}",
                slot_name, removed
            );
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState<C>> {
        // Snapshots are swapped whole, so a poisoned guard still holds a
        // consistent map.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn resolve_id(id: Option<String>) -> Result<String, RegistryError> {
    match id {
        None => Ok(generate_contribution_id()),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(RegistryError::InvalidContributionId(raw));
            }
            Ok(trimmed.to_string())
        }
    }
}

fn sort_entries<C: ?Sized>(entries: &mut [Contribution<C>]) {
    entries.sort_by_key(|entry| (entry.order, entry.seq));
}

#[cfg(test)]
mod tests {
    use super::{Registration, RegistryError, SlotRegistry};
    use crate::extension::contribution::{RegisterOptions, DEFAULT_CONTRIBUTION_ORDER};
    use std::sync::Arc;

    fn ids(registry: &SlotRegistry<str>, slot: &str) -> Vec<String> {
        registry
            .get_slot(slot)
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    #[test]
    fn generates_unique_ids_when_omitted() {
        let registry = SlotRegistry::<str>::new();
        let first = registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new())
            .expect("first registration");
        let second = registry
            .register_component("sidebar", Arc::from("b"), RegisterOptions::new())
            .expect("second registration");

        assert_ne!(first.id(), second.id());
        assert_eq!(registry.get_slot("sidebar").len(), 2);
    }

    #[test]
    fn applies_default_order() {
        let registry = SlotRegistry::<str>::new();
        registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("registration");
        assert_eq!(
            registry.get_slot("sidebar")[0].order,
            DEFAULT_CONTRIBUTION_ORDER
        );

        let custom = SlotRegistry::<str>::with_default_order(50);
        custom
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("registration");
        assert_eq!(custom.get_slot("sidebar")[0].order, 50);
    }

    #[test]
    fn rejects_blank_explicit_id() {
        let registry = SlotRegistry::<str>::new();
        let err = registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("  "))
            .expect_err("blank id must fail");
        assert_eq!(err, RegistryError::InvalidContributionId("  ".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn trims_explicit_id() {
        let registry = SlotRegistry::<str>::new();
        let outcome = registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id(" a "))
            .expect("registration");
        assert_eq!(outcome, Registration::Inserted { id: "a".to_string() });
        assert!(registry.contains("sidebar", "a"));
        assert!(registry.unregister_component("sidebar", " a"));
    }

    #[test]
    fn accepts_empty_slot_name() {
        let registry = SlotRegistry::<str>::new();
        registry
            .register_component("", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("empty slot name is a valid key");
        assert_eq!(ids(&registry, ""), vec!["a"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let registry = SlotRegistry::<str>::new();
        registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("registration");
        let before = registry.get_slot("sidebar");

        registry
            .register_component("sidebar", Arc::from("b"), RegisterOptions::new().id("b"))
            .expect("registration");
        registry.unregister_component("sidebar", "a");

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].id, "a");
        assert_eq!(ids(&registry, "sidebar"), vec!["b"]);
    }

    #[test]
    fn replace_updates_in_place_and_keeps_tie_position() {
        let registry = SlotRegistry::<str>::new();
        for id in ["a", "b", "c"] {
            registry
                .register_component("sidebar", Arc::from(id), RegisterOptions::new().id(id))
                .expect("registration");
        }

        let outcome = registry
            .replace_component(
                "sidebar",
                Arc::from("a2"),
                RegisterOptions::new().id("a").prop("title", "updated"),
            )
            .expect("replace");
        assert_eq!(outcome, Registration::Replaced { id: "a".to_string() });

        let slot = registry.get_slot("sidebar");
        assert_eq!(ids(&registry, "sidebar"), vec!["a", "b", "c"]);
        assert_eq!(&*slot[0].component, "a2");
        assert_eq!(slot[0].props.str("title"), Some("updated"));
    }

    #[test]
    fn replace_reorders_when_order_changes() {
        let registry = SlotRegistry::<str>::new();
        registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a").order(1))
            .expect("registration");
        registry
            .register_component("sidebar", Arc::from("b"), RegisterOptions::new().id("b").order(2))
            .expect("registration");

        registry
            .replace_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a").order(3))
            .expect("replace");
        assert_eq!(ids(&registry, "sidebar"), vec!["b", "a"]);
    }

    #[test]
    fn replace_inserts_when_absent() {
        let registry = SlotRegistry::<str>::new();
        let outcome = registry
            .replace_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("replace");
        assert_eq!(outcome, Registration::Inserted { id: "a".to_string() });
        assert!(registry.contains("sidebar", "a"));
    }

    #[test]
    fn removing_last_entry_drops_slot_name() {
        let registry = SlotRegistry::<str>::new();
        registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("registration");
        registry
            .register_component("header", Arc::from("h"), RegisterOptions::new().id("h"))
            .expect("registration");
        assert_eq!(registry.slot_names(), vec!["header", "sidebar"]);

        assert!(registry.unregister_component("sidebar", "a"));
        assert_eq!(registry.slot_names(), vec!["header"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clear_slot_reports_removed_count() {
        let registry = SlotRegistry::<str>::new();
        for id in ["a", "b"] {
            registry
                .register_component("sidebar", Arc::from(id), RegisterOptions::new().id(id))
                .expect("registration");
        }
        assert_eq!(registry.clear_slot("sidebar"), 2);
        assert_eq!(registry.clear_slot("sidebar"), 0);
        assert!(registry.get_slot("sidebar").is_empty());
    }

    #[test]
    fn debug_output_lists_slot_sizes() {
        let registry = SlotRegistry::<str>::new();
        registry
            .register_component("sidebar", Arc::from("a"), RegisterOptions::new().id("a"))
            .expect("registration");
        let rendered = format!("{registry:?}");
        assert!(rendered.contains("sidebar"));
        assert!(rendered.contains("default_order"));
    }
}
