//! Process-wide component health registry.
//!
//! Long-running tasks (provider supervisor, event router, gateway) report
//! their state here; the gateway surfaces it through `/health` and `/status`.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub restarts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentHealth>,
}

fn registry() -> &'static Mutex<BTreeMap<String, ComponentHealth>> {
    static REGISTRY: OnceLock<Mutex<BTreeMap<String, ComponentHealth>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(BTreeMap::new()))
}

fn started_at() -> Instant {
    static STARTED_AT: OnceLock<Instant> = OnceLock::new();
    *STARTED_AT.get_or_init(Instant::now)
}

/// Record process start. Call once, early in `main`, so uptime is meaningful.
pub fn mark_process_start() {
    let _ = started_at();
}

pub fn mark_component_ok(name: &str) {
    let mut components = registry().lock();
    let entry = components.entry(name.to_string()).or_insert(ComponentHealth {
        status: ComponentStatus::Ok,
        detail: None,
        restarts: 0,
    });
    entry.status = ComponentStatus::Ok;
    entry.detail = None;
}

pub fn mark_component_error(name: &str, detail: impl Into<String>) {
    let mut components = registry().lock();
    let entry = components.entry(name.to_string()).or_insert(ComponentHealth {
        status: ComponentStatus::Ok,
        detail: None,
        restarts: 0,
    });
    entry.status = ComponentStatus::Error;
    entry.detail = Some(detail.into());
}

pub fn bump_component_restart(name: &str) {
    let mut components = registry().lock();
    if let Some(entry) = components.get_mut(name) {
        entry.restarts = entry.restarts.saturating_add(1);
    }
}

pub fn snapshot() -> HealthSnapshot {
    HealthSnapshot {
        uptime_seconds: started_at().elapsed().as_secs(),
        components: registry().lock().clone(),
    }
}

pub fn snapshot_json() -> serde_json::Value {
    serde_json::to_value(snapshot()).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_then_error_keeps_latest_status() {
        mark_component_ok("test:component-a");
        mark_component_error("test:component-a", "stream closed");

        let snap = snapshot();
        let component = snap.components.get("test:component-a").unwrap();
        assert_eq!(component.status, ComponentStatus::Error);
        assert_eq!(component.detail.as_deref(), Some("stream closed"));
    }

    #[test]
    fn recovery_clears_error_detail() {
        mark_component_error("test:component-b", "boom");
        mark_component_ok("test:component-b");

        let snap = snapshot();
        let component = snap.components.get("test:component-b").unwrap();
        assert_eq!(component.status, ComponentStatus::Ok);
        assert!(component.detail.is_none());
    }

    #[test]
    fn restart_counter_accumulates() {
        mark_component_ok("test:component-c");
        bump_component_restart("test:component-c");
        bump_component_restart("test:component-c");

        let snap = snapshot();
        assert_eq!(snap.components.get("test:component-c").unwrap().restarts, 2);
    }

    #[test]
    fn restart_bump_on_unknown_component_is_a_no_op() {
        bump_component_restart("test:never-registered");
        let snap = snapshot();
        assert!(!snap.components.contains_key("test:never-registered"));
    }
}
