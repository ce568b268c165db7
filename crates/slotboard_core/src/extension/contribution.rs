//! Slot contribution model.
//!
//! # Responsibility
//! - Define the record stored per registered slot contribution.
//! - Provide the immutable props mapping forwarded to components at render time.
//!
//! # Invariants
//! - `id` is unique within one slot.
//! - `props` never changes after registration; updates go through
//!   `SlotRegistry::replace_component`.
//! - `component` is opaque to the registry.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Order applied when registration options omit one.
pub const DEFAULT_CONTRIBUTION_ORDER: i32 = 10;

/// Props key reserved for the render context.
///
/// Contributors cannot shadow the renderer's context through this key.
pub const RESERVED_CONTEXT_PROP: &str = "context";

/// Immutable, cheaply clonable props mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props(Arc<BTreeMap<String, Value>>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns a string prop value, if present and a JSON string.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the props view handed to components: reserved keys removed.
    pub(crate) fn without_reserved(&self) -> Props {
        if !self.contains_key(RESERVED_CONTEXT_PROP) {
            return self.clone();
        }
        let filtered = self
            .0
            .iter()
            .filter(|(key, _)| key.as_str() != RESERVED_CONTEXT_PROP)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Props(Arc::new(filtered))
    }
}

impl FromIterator<(String, Value)> for Props {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Props(Arc::new(iter.into_iter().collect()))
    }
}

impl From<BTreeMap<String, Value>> for Props {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Props(Arc::new(value))
    }
}

/// Optional registration parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterOptions {
    /// Stable contribution id. Generated when `None`.
    pub id: Option<String>,
    /// Render position. Registry default applies when `None`.
    pub order: Option<i32>,
    /// Extra parameters forwarded to the component.
    pub props: Props,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Adds one prop, copying the existing mapping.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map: BTreeMap<String, Value> = (*self.props.0).clone();
        map.insert(key.into(), value.into());
        self.props = Props::from(map);
        self
    }
}

/// One registered slot contribution.
#[derive(Debug)]
pub struct Contribution<C: ?Sized> {
    pub id: String,
    pub slot_name: String,
    pub component: Arc<C>,
    pub order: i32,
    pub props: Props,
    /// Registry-wide insertion sequence; breaks ties between equal orders.
    pub(crate) seq: u64,
}

// Manual impl: `C` itself does not need to be `Clone`.
impl<C: ?Sized> Clone for Contribution<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            slot_name: self.slot_name.clone(),
            component: Arc::clone(&self.component),
            order: self.order,
            props: self.props.clone(),
            seq: self.seq,
        }
    }
}

pub(crate) fn generate_contribution_id() -> String {
    Uuid::new_v4().to_string()
}
