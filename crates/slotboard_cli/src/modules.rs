//! Built-in dashboard modules for the demo host.

use log::warn;
use serde_json::json;
use slotboard_core::{
    EventBus, ModuleCapabilities, ModuleInitError, ModuleList, RegisterOptions, RenderProps,
    SlotComponent, SlotModule, Subscription,
};
use std::sync::Arc;

/// Render context supplied by the host page.
#[derive(Debug, Clone)]
pub struct Page {
    pub role: String,
}

/// Component handle type stored in the demo registry.
pub type Widget = dyn SlotComponent<Page, Output = String> + Send + Sync;

/// Bus payload for attendance changes.
#[derive(Debug, Clone)]
pub struct AttendanceChanged {
    pub student_id: String,
    pub percentage: u8,
}

const LOW_ATTENDANCE_PERCENT: u8 = 75;

/// Text card showing `title` and, when set, `body`.
struct TextCard;

impl SlotComponent<Page> for TextCard {
    type Output = String;

    fn render(&self, props: RenderProps<'_, Page>) -> String {
        let title = props.props.str("title").unwrap_or("Untitled");
        match props.props.str("body") {
            Some(body) => format!("{title}: {body}"),
            None => title.to_string(),
        }
    }
}

/// Greets the viewer by role.
struct Greeting;

impl SlotComponent<Page> for Greeting {
    type Output = String;

    fn render(&self, props: RenderProps<'_, Page>) -> String {
        let campus = props.props.str("campus").unwrap_or("main campus");
        format!("Welcome, {} ({campus})", props.context.role)
    }
}

/// Shows a metric only to the roles listed in the `roles` prop.
struct RoleMetric;

impl SlotComponent<Page> for RoleMetric {
    type Output = String;

    fn render(&self, props: RenderProps<'_, Page>) -> String {
        let label = props.props.str("label").unwrap_or("metric");
        let role = props.context.role.as_str();
        let visible = props
            .props
            .get("roles")
            .and_then(|roles| roles.as_array())
            .is_some_and(|roles| roles.iter().any(|allowed| allowed.as_str() == Some(role)));
        if !visible {
            return format!("{label}: not available for {role}");
        }
        match props.props.get("value") {
            Some(value) => match value.as_str() {
                Some(text) => format!("{label}: {text}"),
                None => format!("{label}: {value}"),
            },
            None => format!("{label}: n/a"),
        }
    }
}

struct HeaderModule;

impl SlotModule<Widget> for HeaderModule {
    fn id(&self) -> &str {
        "dashboard.header"
    }

    fn init(&self, caps: &ModuleCapabilities<'_, Widget>) -> Result<(), ModuleInitError> {
        caps.register_component(
            "dash-header",
            Arc::new(Greeting),
            RegisterOptions::new().id("greeting").order(0).prop("campus", "north"),
        )?;
        Ok(())
    }
}

struct StudentModule;

impl SlotModule<Widget> for StudentModule {
    fn id(&self) -> &str {
        "dashboard.student"
    }

    fn init(&self, caps: &ModuleCapabilities<'_, Widget>) -> Result<(), ModuleInitError> {
        caps.register_component(
            "dash-widgets",
            Arc::new(RoleMetric),
            RegisterOptions::new()
                .id("attendance")
                .order(5)
                .prop("label", "Attendance")
                .prop("value", "82%")
                .prop("roles", json!(["student", "faculty"])),
        )?;
        caps.register_component(
            "dash-widgets",
            Arc::new(RoleMetric),
            RegisterOptions::new()
                .id("fees")
                .order(20)
                .prop("label", "Fees due")
                .prop("value", 0)
                .prop("roles", json!(["student"])),
        )?;
        Ok(())
    }
}

/// Posts announcements and watches attendance for low values.
struct AnnouncementsModule {
    _low_attendance: Subscription<AttendanceChanged>,
}

impl AnnouncementsModule {
    fn new(bus: &EventBus<AttendanceChanged>) -> Self {
        let subscription = bus.subscribe("attendance.updated", |event: &AttendanceChanged| {
            if event.percentage < LOW_ATTENDANCE_PERCENT {
                warn!(
                    "event=low_attendance module=announcements status=ok student_id={} percentage={}",
                    event.student_id, event.percentage
                );
            }
        });
        Self {
            _low_attendance: subscription,
        }
    }
}

impl SlotModule<Widget> for AnnouncementsModule {
    fn id(&self) -> &str {
        "dashboard.announcements"
    }

    fn init(&self, caps: &ModuleCapabilities<'_, Widget>) -> Result<(), ModuleInitError> {
        caps.register_component(
            "dash-widgets",
            Arc::new(TextCard),
            RegisterOptions::new()
                .id("announcements")
                .prop("title", "Announcements")
                .prop("body", "Mid-term timetable published"),
        )?;
        Ok(())
    }
}

struct ChatModule;

impl SlotModule<Widget> for ChatModule {
    fn id(&self) -> &str {
        "chat.widget"
    }

    fn init(&self, caps: &ModuleCapabilities<'_, Widget>) -> Result<(), ModuleInitError> {
        caps.register_component(
            "dash-footer",
            Arc::new(TextCard),
            RegisterOptions::new().id("chat-launcher").prop("title", "Ask the assistant"),
        )?;
        Ok(())
    }
}

/// Fixed module list of the demo host, in init order.
pub fn dashboard_modules(bus: &EventBus<AttendanceChanged>) -> ModuleList<Widget> {
    vec![
        Box::new(HeaderModule),
        Box::new(StudentModule),
        Box::new(AnnouncementsModule::new(bus)),
        Box::new(ChatModule),
    ]
}
