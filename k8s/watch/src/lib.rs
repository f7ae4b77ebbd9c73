#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Reconcile-on-change watching: one event pump per resource kind feeding a
//! debouncer, with a periodic resync tick as a safety net for missed watch
//! events. Settled bursts surface as reason strings on a channel; the
//! orchestrator runs one evaluation per received reason.

pub mod debounce;

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info_span, Instrument};

use mcp_governance_controller_k8s_api::{dynamic_api, ResourceKind};

const MAX_RECORDED_ERRORS: usize = 10;

#[derive(Clone, Debug)]
pub struct Config {
    pub kinds: Vec<ResourceKind>,
    /// Quiescence window before a burst of changes triggers a reconcile.
    pub debounce: Duration,
    /// Interval of the unconditional resync trigger.
    pub resync: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kinds: ResourceKind::default_watched(),
            debounce: Duration::from_secs(3),
            resync: Duration::from_secs(300),
        }
    }
}

/// Runtime counters, readable concurrently with event processing.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStats {
    pub active_watches: usize,
    pub total_kinds: usize,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mcp_governance_controller_core::timefmt::rfc3339_seconds_opt"
    )]
    pub last_event: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mcp_governance_controller_core::timefmt::rfc3339_seconds_opt"
    )]
    pub last_reconcile: Option<DateTime<Utc>>,
    pub event_count: u64,
    pub reconcile_count: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub watch_errors: Vec<String>,
}

pub struct Watcher {
    stats: Arc<RwLock<WatcherStats>>,
}

impl Watcher {
    /// Spawns the per-kind pumps, the resync ticker, and the debouncer.
    /// Returns the handle and the channel delivering settled reconcile
    /// reasons. The shutdown signal tears down every spawned task; the
    /// reason channel then closes.
    pub fn spawn(
        client: Client,
        config: Config,
        shutdown: drain::Watch,
    ) -> (Watcher, mpsc::UnboundedReceiver<String>) {
        let stats = Arc::new(RwLock::new(WatcherStats {
            total_kinds: config.kinds.len(),
            ..Default::default()
        }));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        for kind in &config.kinds {
            tokio::spawn(
                pump(
                    client.clone(),
                    *kind,
                    event_tx.clone(),
                    Arc::clone(&stats),
                    shutdown.clone(),
                )
                .instrument(info_span!("watch", kind = %kind)),
            );
            stats.write().active_watches += 1;
        }
        tokio::spawn(resync_tick(config.resync, event_tx, shutdown));

        let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce::run(event_rx, config.debounce, fired_tx));

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let reconcile_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Some(reason) = fired_rx.recv().await {
                {
                    let mut stats = reconcile_stats.write();
                    stats.last_reconcile = Some(Utc::now());
                    stats.reconcile_count += 1;
                }
                if out_tx.send(reason).is_err() {
                    return;
                }
            }
        });

        tracing::info!(
            kinds = config.kinds.len(),
            debounce = ?config.debounce,
            resync = ?config.resync,
            "resource watcher started",
        );
        (Watcher { stats }, out_rx)
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats.read().clone()
    }
}

async fn pump(
    client: Client,
    kind: ResourceKind,
    events: mpsc::UnboundedSender<String>,
    stats: Arc<RwLock<WatcherStats>>,
    shutdown: drain::Watch,
) {
    let api = dynamic_api(client, kind);
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    let shutdown = shutdown.signaled();
    tokio::pin!(shutdown);

    let mut filter = GenerationFilter::default();
    loop {
        let event = tokio::select! {
            _ = &mut shutdown => return,
            event = stream.next() => match event {
                Some(event) => event,
                None => return,
            },
        };
        match event {
            Ok(watcher::Event::Applied(obj)) => {
                if let Some(reason) = filter.observe_apply(&obj) {
                    record_event(&stats);
                    if events.send(format!("{kind} {reason}")).is_err() {
                        return;
                    }
                }
            }
            Ok(watcher::Event::Deleted(obj)) => {
                let reason = filter.observe_delete(&obj);
                record_event(&stats);
                if events.send(format!("{kind} {reason}")).is_err() {
                    return;
                }
            }
            Ok(watcher::Event::Restarted(objs)) => {
                for reason in filter.reset(&objs) {
                    record_event(&stats);
                    if events.send(format!("{kind} {reason}")).is_err() {
                        return;
                    }
                }
            }
            // A kind whose CRD is not installed lands here repeatedly; the
            // stream backs off and retries, and the rest of the kinds keep
            // watching.
            Err(error) => {
                tracing::info!(%error, "watch interrupted; retrying");
                let mut stats = stats.write();
                stats.watch_errors.push(format!("{kind}: {error}"));
                let len = stats.watch_errors.len();
                if len > MAX_RECORDED_ERRORS {
                    stats.watch_errors.drain(..len - MAX_RECORDED_ERRORS);
                }
            }
        }
    }
}

async fn resync_tick(
    period: Duration,
    events: mpsc::UnboundedSender<String>,
    shutdown: drain::Watch,
) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    let shutdown = shutdown.signaled();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            _ = ticker.tick() => {
                if events.send("resync".to_string()).is_err() {
                    return;
                }
            }
        }
    }
}

fn record_event(stats: &RwLock<WatcherStats>) {
    let mut stats = stats.write();
    stats.last_event = Some(Utc::now());
    stats.event_count += 1;
}

/// Distinguishes spec changes from status-only updates by remembering the
/// last seen `metadata.generation` per object. Status writes bump the
/// resourceVersion but not the generation, so dropping unchanged-generation
/// updates breaks the write-status -> watch-event -> reconcile loop.
#[derive(Default)]
pub struct GenerationFilter {
    generations: HashMap<String, i64>,
}

impl GenerationFilter {
    /// Returns the reason for a material apply event, or None for a
    /// status-only update. Objects that never carry a generation (0) are
    /// always considered material.
    pub fn observe_apply(&mut self, obj: &DynamicObject) -> Option<String> {
        let key = object_key(obj);
        let generation = obj.metadata.generation.unwrap_or(0);
        match self.generations.insert(key.clone(), generation) {
            None => Some(format!("add {key}")),
            Some(previous) if generation == previous && generation > 0 => None,
            Some(_) => Some(format!("update {key}")),
        }
    }

    pub fn observe_delete(&mut self, obj: &DynamicObject) -> String {
        let key = object_key(obj);
        self.generations.remove(&key);
        format!("delete {key}")
    }

    /// Handles a relist: new and changed objects produce reasons, unchanged
    /// ones stay silent, and objects that vanished while the watch was down
    /// produce delete reasons.
    pub fn reset(&mut self, objs: &[DynamicObject]) -> Vec<String> {
        let mut reasons = Vec::new();
        let mut seen = Vec::with_capacity(objs.len());
        for obj in objs {
            seen.push(object_key(obj));
            if let Some(reason) = self.observe_apply(obj) {
                reasons.push(reason);
            }
        }
        let missing: Vec<String> = self
            .generations
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in missing {
            self.generations.remove(&key);
            reasons.push(format!("delete {key}"));
        }
        reasons
    }
}

fn object_key(obj: &DynamicObject) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(name: &str, generation: Option<i64>, rv: &str) -> DynamicObject {
        let mut metadata = json!({"name": name, "namespace": "ns", "resourceVersion": rv});
        if let Some(generation) = generation {
            metadata["generation"] = json!(generation);
        }
        serde_json::from_value(json!({
            "apiVersion": "kagent.dev/v1alpha1",
            "kind": "MCPServer",
            "metadata": metadata,
        }))
        .expect("fixture")
    }

    #[test]
    fn first_sight_is_an_add() {
        let mut filter = GenerationFilter::default();
        assert_eq!(filter.observe_apply(&obj("a", Some(1), "1")).as_deref(), Some("add ns/a"));
    }

    #[test]
    fn status_only_updates_are_dropped() {
        let mut filter = GenerationFilter::default();
        filter.observe_apply(&obj("a", Some(1), "1"));
        // Status write: resourceVersion moved, generation did not.
        assert!(filter.observe_apply(&obj("a", Some(1), "2")).is_none());
        // Spec change: generation moved.
        assert_eq!(
            filter.observe_apply(&obj("a", Some(2), "3")).as_deref(),
            Some("update ns/a")
        );
    }

    #[test]
    fn zero_generation_objects_always_pass() {
        let mut filter = GenerationFilter::default();
        filter.observe_apply(&obj("a", None, "1"));
        assert_eq!(
            filter.observe_apply(&obj("a", None, "2")).as_deref(),
            Some("update ns/a")
        );
    }

    #[test]
    fn delete_forgets_the_object() {
        let mut filter = GenerationFilter::default();
        filter.observe_apply(&obj("a", Some(3), "1"));
        assert_eq!(filter.observe_delete(&obj("a", Some(3), "1")), "delete ns/a");
        // Recreation is an add again.
        assert_eq!(filter.observe_apply(&obj("a", Some(1), "5")).as_deref(), Some("add ns/a"));
    }

    #[test]
    fn reset_reports_adds_updates_and_vanished_objects() {
        let mut filter = GenerationFilter::default();
        filter.observe_apply(&obj("kept", Some(1), "1"));
        filter.observe_apply(&obj("gone", Some(1), "1"));

        let reasons = filter.reset(&[obj("kept", Some(1), "9"), obj("new", Some(1), "1")]);
        assert!(reasons.contains(&"add ns/new".to_string()));
        assert!(reasons.contains(&"delete ns/gone".to_string()));
        // The unchanged survivor stays silent.
        assert!(!reasons.iter().any(|r| r.contains("kept")));
    }
}
