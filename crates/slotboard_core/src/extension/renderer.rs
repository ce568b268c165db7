//! Slot rendering at host mount points.
//!
//! # Responsibility
//! - Turn the current contributions of one slot into ordered outputs.
//! - Forward the host render context to every component.
//!
//! # Invariants
//! - Rendering never mutates registry state.
//! - Components always receive the renderer's context; a `context` prop set
//!   by a contributor is stripped before render.
//! - A panicking component is skipped and logged; it never aborts the slot.

use crate::extension::contribution::Props;
use crate::extension::slot_registry::SlotRegistry;
use crate::logging::describe_panic_payload;
use log::error;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Renderable unit contributed into a slot.
///
/// `X` is the host render context; `Output` is whatever the host UI layer
/// consumes (markup, widget trees, text).
pub trait SlotComponent<X: ?Sized> {
    type Output;

    fn render(&self, props: RenderProps<'_, X>) -> Self::Output;
}

/// Inputs for one component render call.
#[derive(Debug)]
pub struct RenderProps<'a, X: ?Sized> {
    /// Registered props, without reserved keys.
    pub props: &'a Props,
    /// Context supplied by the mounting host.
    pub context: &'a X,
}

/// One successfully rendered contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContribution<O> {
    pub id: String,
    pub order: i32,
    pub output: O,
}

/// Result of rendering one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered<O> {
    /// Outputs in slot order.
    Components(Vec<RenderedContribution<O>>),
    /// Nothing renderable was registered.
    Fallback(O),
}

impl<O> Rendered<O> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    /// Flattens into plain outputs, fallback included.
    pub fn into_outputs(self) -> Vec<O> {
        match self {
            Self::Components(items) => items.into_iter().map(|item| item.output).collect(),
            Self::Fallback(output) => vec![output],
        }
    }
}

/// Mount point bound to one slot name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRenderer {
    slot_name: String,
}

impl SlotRenderer {
    pub fn new(slot_name: impl Into<String>) -> Self {
        Self {
            slot_name: slot_name.into(),
        }
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    /// Renders every contribution of this slot in registry order.
    ///
    /// Returns `fallback` when the slot is empty or every component failed.
    pub fn render<C, X, O>(
        &self,
        registry: &SlotRegistry<C>,
        context: &X,
        fallback: O,
    ) -> Rendered<O>
    where
        C: SlotComponent<X, Output = O> + ?Sized,
        X: ?Sized,
    {
        let snapshot = registry.get_slot(&self.slot_name);
        if snapshot.is_empty() {
            return Rendered::Fallback(fallback);
        }

        let mut rendered = Vec::with_capacity(snapshot.len());
        for entry in snapshot.iter() {
            let props = entry.props.without_reserved();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                entry.component.render(RenderProps {
                    props: &props,
                    context,
                })
            }));
            match outcome {
                Ok(output) => rendered.push(RenderedContribution {
                    id: entry.id.clone(),
                    order: entry.order,
                    output,
                }),
                Err(payload) => {
                    error!(
                        "event=slot_render module=renderer status=error slot={} id={} panic={}",
                        self.slot_name,
                        entry.id,
                        describe_panic_payload(&*payload)
                    );
                }
            }
        }

        if rendered.is_empty() {
            return Rendered::Fallback(fallback);
        }
        Rendered::Components(rendered)
    }
}

/// Shorthand for a one-off `SlotRenderer::render`.
pub fn render_slot<C, X, O>(
    registry: &SlotRegistry<C>,
    slot_name: &str,
    context: &X,
    fallback: O,
) -> Rendered<O>
where
    C: SlotComponent<X, Output = O> + ?Sized,
    X: ?Sized,
{
    SlotRenderer::new(slot_name).render(registry, context, fallback)
}

#[cfg(test)]
mod tests {
    use super::{render_slot, RenderProps, Rendered, SlotComponent, SlotRenderer};
    use crate::extension::contribution::RegisterOptions;
    use crate::extension::slot_registry::SlotRegistry;
    use std::sync::Arc;

    type TextComponent = dyn SlotComponent<String, Output = String> + Send + Sync;

    struct Label;

    impl SlotComponent<String> for Label {
        type Output = String;

        fn render(&self, props: RenderProps<'_, String>) -> String {
            let title = props.props.str("title").unwrap_or("untitled");
            format!("{title}@{}", props.context)
        }
    }

    struct Broken;

    impl SlotComponent<String> for Broken {
        type Output = String;

        fn render(&self, _props: RenderProps<'_, String>) -> String {
            panic!("widget failed to render");
        }
    }

    #[test]
    fn renders_in_slot_order_with_context() {
        let registry = SlotRegistry::<TextComponent>::new();
        registry
            .register_component(
                "header",
                Arc::new(Label),
                RegisterOptions::new().id("late").order(20).prop("title", "late"),
            )
            .expect("registration");
        registry
            .register_component(
                "header",
                Arc::new(Label),
                RegisterOptions::new().id("early").order(1).prop("title", "early"),
            )
            .expect("registration");

        let rendered =
            SlotRenderer::new("header").render(&registry, &"ctx".to_string(), String::new());
        assert_eq!(rendered.into_outputs(), vec!["early@ctx", "late@ctx"]);
    }

    #[test]
    fn empty_slot_yields_fallback() {
        let registry = SlotRegistry::<TextComponent>::new();
        let rendered = render_slot(&registry, "missing", &"ctx".to_string(), "nothing".to_string());
        assert_eq!(rendered, Rendered::Fallback("nothing".to_string()));
    }

    #[test]
    fn panicking_component_is_skipped() {
        let registry = SlotRegistry::<TextComponent>::new();
        registry
            .register_component("header", Arc::new(Broken), RegisterOptions::new().id("broken"))
            .expect("registration");
        registry
            .register_component(
                "header",
                Arc::new(Label),
                RegisterOptions::new().id("ok").prop("title", "ok"),
            )
            .expect("registration");

        let rendered = render_slot(&registry, "header", &"ctx".to_string(), String::new());
        match rendered {
            Rendered::Components(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].id, "ok");
            }
            Rendered::Fallback(_) => panic!("healthy component must render"),
        }
    }

    #[test]
    fn all_components_failing_yields_fallback() {
        let registry = SlotRegistry::<TextComponent>::new();
        registry
            .register_component("header", Arc::new(Broken), RegisterOptions::new().id("broken"))
            .expect("registration");

        let rendered = render_slot(&registry, "header", &"ctx".to_string(), "fallback".to_string());
        assert!(rendered.is_fallback());
    }
}
