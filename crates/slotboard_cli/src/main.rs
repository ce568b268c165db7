//! Demo host for the slot registry.
//!
//! # Responsibility
//! - Wire config, registry, module loading, rendering and the event bus the
//!   way a dashboard host would.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `slotboard_cli [config.json]`

mod modules;

use log::info;
use modules::{dashboard_modules, AttendanceChanged, Page, Widget};
use slotboard_core::{EventBus, HostConfig, ModuleLoader, SlotRenderer};
use std::path::Path;
use std::process::ExitCode;

const HOST_SLOTS: &[&str] = &["dash-header", "dash-widgets", "dash-footer"];

fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => HostConfig::from_path(Path::new(&path)),
        None => Ok(HostConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("slotboard: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = config.init_logging() {
        eprintln!("slotboard: {err}");
        return ExitCode::FAILURE;
    }

    println!("slotboard_core version={}", slotboard_core::core_version());

    let registry = config.registry::<Widget>();
    let bus = EventBus::<AttendanceChanged>::new();
    let modules = dashboard_modules(&bus);
    let report = ModuleLoader::new(&registry).load(&modules);
    println!(
        "modules loaded={} failed={} contributions={}",
        report.loaded.len(),
        report.failures.len(),
        registry.len()
    );
    for failure in &report.failures {
        println!("  module {} failed: {}", failure.module_id, failure.error);
    }

    for role in ["student", "faculty"] {
        let page = Page {
            role: role.to_string(),
        };
        println!("== {role} dashboard");
        for slot in HOST_SLOTS {
            let outputs = SlotRenderer::new(*slot)
                .render(&registry, &page, format!("({slot}: empty)"))
                .into_outputs();
            for line in outputs {
                println!("  [{slot}] {line}");
            }
        }
    }

    let report = bus.emit(
        "attendance.updated",
        &AttendanceChanged {
            student_id: "s-104".to_string(),
            percentage: 72,
        },
    );
    info!(
        "event=demo_emit module=cli status=ok delivered={} failed={}",
        report.delivered, report.failed
    );
    println!(
        "attendance.updated delivered={} failed={}",
        report.delivered, report.failed
    );

    ExitCode::SUCCESS
}
