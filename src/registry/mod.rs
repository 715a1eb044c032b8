//! Widget Registry & Lifecycle
//!
//! Maps each slot to at most one mounted widget and is the only path by
//! which the pipeline reaches a widget. Queues, the batcher and the density
//! monitor never hold an instance themselves, so they can never call into
//! a destroyed one.
//!
//! Widget failures (errors or panics) are caught per widget and logged; a
//! failing widget never stops delivery to the others in the same pass.

mod widget;

pub use widget::{UpdateObserver, Widget, WidgetEvent, WidgetFactory};

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::ClientResult;
use crate::types::{SlotId, TemplateComponent, WidgetConfig, WidgetKind};

struct MountedComponent {
    kind: WidgetKind,
    component_id: String,
    instance: Box<dyn Widget>,
}

/// Slot → widget mapping shared by every pipeline component
pub struct WidgetRegistry {
    mounted: Mutex<BTreeMap<SlotId, MountedComponent>>,
    factory: Box<dyn WidgetFactory>,
    observer: RwLock<Option<Weak<dyn UpdateObserver>>>,
}

impl WidgetRegistry {
    pub fn new(factory: impl WidgetFactory + 'static) -> Self {
        Self {
            mounted: Mutex::new(BTreeMap::new()),
            factory: Box::new(factory),
            observer: RwLock::new(None),
        }
    }

    /// Register the observer notified of per-slot broadcasts
    pub fn set_observer<O: UpdateObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn UpdateObserver> = observer.clone();
        *self.observer.write() = Some(Arc::downgrade(&observer));
    }

    /// Mount a new widget into `slot`, replacing any occupant
    ///
    /// Returns `false` (after logging) if construction, `render` or
    /// `after_mount` fails; the slot is left empty in that case.
    pub fn mount(&self, slot: SlotId, kind: WidgetKind, config: &WidgetConfig) -> bool {
        self.unmount(slot);

        let Some(mut instance) = guarded(slot, kind, "create", || self.factory.create(kind, config)) else {
            return false;
        };

        let ready = guarded(slot, kind, "render", || instance.render()).is_some()
            && guarded(slot, kind, "after_mount", || instance.after_mount()).is_some();
        if !ready {
            guarded(slot, kind, "destroy", || instance.destroy());
            return false;
        }

        let component = MountedComponent {
            kind,
            component_id: config.component_id.clone(),
            instance,
        };

        // A concurrent mount may have raced us into the slot
        if let Some(mut previous) = self.mounted.lock().insert(slot, component) {
            guarded(slot, previous.kind, "destroy", || previous.instance.destroy());
        }

        info!(%slot, %kind, component = %config.component_id, "mounted widget");
        true
    }

    /// Destroy and remove the widget in `slot`; returns whether one was there
    pub fn unmount(&self, slot: SlotId) -> bool {
        let removed = self.mounted.lock().remove(&slot);
        match removed {
            Some(mut component) => {
                guarded(slot, component.kind, "destroy", || component.instance.destroy());
                debug!(%slot, kind = %component.kind, component = %component.component_id, "unmounted widget");
                true
            }
            None => false,
        }
    }

    pub fn unmount_all(&self) {
        let drained = std::mem::take(&mut *self.mounted.lock());
        for (slot, mut component) in drained {
            guarded(slot, component.kind, "destroy", || component.instance.destroy());
        }
    }

    /// Deliver `data` to every mounted widget of `kind`
    ///
    /// Returns the slots whose widget accepted the update; only those are
    /// reported to the observer.
    pub fn broadcast(&self, kind: WidgetKind, data: &Value) -> Vec<SlotId> {
        let delivered: Vec<SlotId> = {
            let mut mounted = self.mounted.lock();
            mounted
                .iter_mut()
                .filter(|(_, component)| component.kind == kind)
                .filter_map(|(slot, component)| {
                    guarded(*slot, kind, "update", || component.instance.update(data)).map(|()| *slot)
                })
                .collect()
        };

        if delivered.is_empty() {
            debug!(%kind, "broadcast reached no widget");
        } else {
            self.notify_observer(&delivered);
        }
        delivered
    }

    /// Deliver an event to every mounted widget regardless of kind
    pub fn dispatch(&self, event: WidgetEvent, payload: &Value) -> usize {
        let mut mounted = self.mounted.lock();
        for (slot, component) in mounted.iter_mut() {
            guarded(*slot, component.kind, event.as_str(), || {
                component.instance.on_event(event, payload)
            });
        }
        debug!(%event, receivers = mounted.len(), "dispatched event");
        mounted.len()
    }

    /// Switch the whole layout: unmount everything, mount every enabled entry
    ///
    /// Returns the number of widgets mounted.
    pub fn apply_template(&self, components: &[TemplateComponent]) -> usize {
        self.unmount_all();

        let mounted = components
            .iter()
            .filter(|component| component.enabled)
            .filter(|component| self.mount(component.slot, component.kind, &component.widget_config()))
            .count();

        info!(mounted, total = components.len(), "applied template");
        mounted
    }

    /// Pause or resume widget-owned rotations (host visibility)
    pub fn set_paused(&self, paused: bool) {
        for component in self.mounted.lock().values_mut() {
            component.instance.set_paused(paused);
        }
    }

    pub fn kind_at(&self, slot: SlotId) -> Option<WidgetKind> {
        self.mounted.lock().get(&slot).map(|component| component.kind)
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.lock().len()
    }

    /// Text view of every mounted slot
    pub fn snapshot(&self) -> BTreeMap<SlotId, Vec<String>> {
        self.mounted
            .lock()
            .iter()
            .map(|(slot, component)| (*slot, component.instance.view()))
            .collect()
    }

    fn notify_observer(&self, slots: &[SlotId]) {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            for slot in slots {
                observer.on_slot_updated(*slot);
            }
        }
    }
}

impl Drop for WidgetRegistry {
    fn drop(&mut self) {
        self.unmount_all();
    }
}

/// Run one widget operation, containing errors and panics
fn guarded<T>(
    slot: SlotId,
    kind: WidgetKind,
    op: &str,
    f: impl FnOnce() -> ClientResult<T>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(%slot, %kind, op, error = %e, "widget operation failed");
            None
        }
        Err(_) => {
            error!(%slot, %kind, op, "widget panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Clone, Copy, PartialEq)]
    enum Behaviour {
        Healthy,
        Errors,
        Panics,
    }

    struct Probe {
        name: String,
        log: Log,
        behaviour: Behaviour,
    }

    impl Probe {
        fn check(&self, op: &str) -> ClientResult<()> {
            match self.behaviour {
                Behaviour::Healthy => Ok(()),
                Behaviour::Errors => Err(ClientError::widget(format!("{} rejected", op))),
                Behaviour::Panics => panic!("{} exploded", op),
            }
        }
    }

    impl Widget for Probe {
        fn render(&mut self) -> ClientResult<()> {
            self.log.lock().push(format!("{}:render", self.name));
            Ok(())
        }
        fn after_mount(&mut self) -> ClientResult<()> {
            self.log.lock().push(format!("{}:after_mount", self.name));
            Ok(())
        }
        fn update(&mut self, data: &Value) -> ClientResult<()> {
            self.check("update")?;
            self.log.lock().push(format!("{}:update:{}", self.name, data));
            Ok(())
        }
        fn on_event(&mut self, event: WidgetEvent, _payload: &Value) -> ClientResult<()> {
            self.check("on_event")?;
            self.log.lock().push(format!("{}:{}", self.name, event));
            Ok(())
        }
        fn destroy(&mut self) -> ClientResult<()> {
            self.log.lock().push(format!("{}:destroy", self.name));
            Err(ClientError::widget("destroy is noisy"))
        }
        fn view(&self) -> Vec<String> {
            vec![self.name.clone()]
        }
    }

    fn probe_registry(log: &Log) -> WidgetRegistry {
        let log = log.clone();
        WidgetRegistry::new(move |_: WidgetKind, config: &WidgetConfig| {
            let id = config.component_id.as_str();
            if id == "broken" {
                return Err(ClientError::widget("cannot build"));
            }
            if id == "panics" {
                panic!("constructor exploded");
            }
            let behaviour = if id.starts_with("err") {
                Behaviour::Errors
            } else if id.starts_with("boom") {
                Behaviour::Panics
            } else {
                Behaviour::Healthy
            };
            Ok(Box::new(Probe {
                name: id.to_string(),
                log: log.clone(),
                behaviour,
            }) as Box<dyn Widget>)
        })
    }

    fn config(id: &str) -> WidgetConfig {
        WidgetConfig {
            component_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_mount_calls_render_then_after_mount() {
        let log = Log::default();
        let registry = probe_registry(&log);

        assert!(registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("a")));
        assert_eq!(*log.lock(), vec!["a:render", "a:after_mount"]);
        assert_eq!(registry.kind_at(SlotId::LeftTop), Some(WidgetKind::ClockWidget));
    }

    #[test]
    fn test_mount_replaces_previous_occupant() {
        let log = Log::default();
        let registry = probe_registry(&log);

        registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("a"));
        registry.mount(SlotId::LeftTop, WidgetKind::WeatherWidget, &config("b"));

        let entries = log.lock().clone();
        let destroy_a = entries.iter().position(|e| e == "a:destroy").unwrap();
        let render_b = entries.iter().position(|e| e == "b:render").unwrap();
        assert!(destroy_a < render_b);
        assert_eq!(registry.mounted_count(), 1);
        assert_eq!(registry.kind_at(SlotId::LeftTop), Some(WidgetKind::WeatherWidget));
    }

    #[test]
    fn test_failed_construction_leaves_slot_empty() {
        let log = Log::default();
        let registry = probe_registry(&log);

        registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("a"));
        assert!(!registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("broken")));
        assert!(!registry.mount(SlotId::RightTop, WidgetKind::ClockWidget, &config("panics")));

        assert_eq!(registry.mounted_count(), 0);
    }

    #[test]
    fn test_broadcast_targets_kind_only() {
        let log = Log::default();
        let registry = probe_registry(&log);

        registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("clock"));
        registry.mount(SlotId::RightLowerLeft, WidgetKind::KpiBlock, &config("kpi"));
        registry.mount(SlotId::RightUpper, WidgetKind::KpiBlock, &config("kpi2"));

        let delivered = registry.broadcast(WidgetKind::KpiBlock, &json!({"main": 10}));
        assert_eq!(delivered, vec![SlotId::RightUpper, SlotId::RightLowerLeft]);
        assert!(!log.lock().iter().any(|e| e.starts_with("clock:update")));
    }

    #[test]
    fn test_broadcast_survives_failing_siblings() {
        let log = Log::default();
        let registry = probe_registry(&log);

        // BTreeMap order: LeftMiddle, LeftLower, RightUpper
        registry.mount(SlotId::LeftMiddle, WidgetKind::KpiBlock, &config("err-kpi"));
        registry.mount(SlotId::LeftLower, WidgetKind::KpiBlock, &config("boom-kpi"));
        registry.mount(SlotId::RightUpper, WidgetKind::KpiBlock, &config("kpi"));

        let delivered = registry.broadcast(WidgetKind::KpiBlock, &json!({"main": 7}));

        assert_eq!(delivered, vec![SlotId::RightUpper]);
        assert!(log.lock().contains(&r#"kpi:update:{"main":7}"#.to_string()));
        assert_eq!(registry.mounted_count(), 3);
    }

    #[test]
    fn test_dispatch_survives_failing_siblings() {
        let log = Log::default();
        let registry = probe_registry(&log);

        registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("err-clock"));
        registry.mount(SlotId::LeftMiddle, WidgetKind::ChatLog, &config("boom-chat"));
        registry.mount(SlotId::RightTop, WidgetKind::ChannelBadge, &config("badge"));

        let reached = registry.dispatch(WidgetEvent::DensityNormal, &json!({}));

        assert_eq!(reached, 3);
        assert!(log.lock().contains(&"badge:density:normal".to_string()));
    }

    #[test]
    fn test_observer_skips_failed_deliveries() {
        let log = Log::default();
        let registry = probe_registry(&log);
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        registry.set_observer(&observer);

        registry.mount(SlotId::LeftMiddle, WidgetKind::ChatLog, &config("err-chat"));
        registry.mount(SlotId::RightUpper, WidgetKind::ChatLog, &config("boom-chat"));
        assert!(registry.broadcast(WidgetKind::ChatLog, &json!({})).is_empty());

        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_reaches_every_widget() {
        let log = Log::default();
        let registry = probe_registry(&log);

        registry.mount(SlotId::LeftTop, WidgetKind::ClockWidget, &config("a"));
        registry.mount(SlotId::LeftMiddle, WidgetKind::ChatLog, &config("b"));

        let reached = registry.dispatch(WidgetEvent::DensityHigh, &json!({}));
        assert_eq!(reached, 2);
        let entries = log.lock().clone();
        assert!(entries.contains(&"a:density:high".to_string()));
        assert!(entries.contains(&"b:density:high".to_string()));
    }

    #[test]
    fn test_apply_template_mounts_enabled_only() {
        let log = Log::default();
        let registry = probe_registry(&log);
        registry.mount(SlotId::CenterFull, WidgetKind::MainAvatarStage, &config("stale"));

        let mut disabled = TemplateComponent::new("off", WidgetKind::KpiBlock, SlotId::RightTop);
        disabled.enabled = false;
        let components = vec![
            TemplateComponent::new("clock", WidgetKind::ClockWidget, SlotId::LeftTop),
            disabled,
        ];

        assert_eq!(registry.apply_template(&components), 1);
        assert_eq!(registry.kind_at(SlotId::CenterFull), None);
        assert_eq!(registry.kind_at(SlotId::RightTop), None);
        assert!(log.lock().contains(&"stale:destroy".to_string()));
    }

    struct CountingObserver(AtomicUsize);

    impl UpdateObserver for CountingObserver {
        fn on_slot_updated(&self, _slot: SlotId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_observer_sees_delivered_slots() {
        let log = Log::default();
        let registry = probe_registry(&log);
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        registry.set_observer(&observer);

        registry.mount(SlotId::LeftMiddle, WidgetKind::ChatLog, &config("chat"));
        registry.broadcast(WidgetKind::ChatLog, &json!({}));
        registry.broadcast(WidgetKind::QueueList, &json!({}));

        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }
}
