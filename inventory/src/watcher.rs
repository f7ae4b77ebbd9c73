use crate::extract::extract_resource;
use crate::patcher::StatusPatcher;
use crate::scorer::{score_catalog, ScoringPolicy};
use crate::types::{VerifiedResource, VerifiedSummary};
use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use mcp_governance_controller_core::CatalogScore;
use mcp_governance_controller_k8s_api::{dynamic_api, ResourceKind};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

pub type SharedInventory = Arc<Inventory>;

type OnChange = Box<dyn Fn() + Send + Sync>;

/// The keyed store of scored catalog entries. Entries are mutated only by
/// the watcher's own handlers; readers snapshot under a short read-hold.
pub struct Inventory {
    policy: ScoringPolicy,
    store: RwLock<Store>,
    stats: RwLock<InventoryStats>,
    on_change: Option<OnChange>,
}

#[derive(Default)]
struct Store {
    resources: HashMap<String, VerifiedResource>,
    summary: VerifiedSummary,
}

/// Runtime counters, behind their own lock so readers never contend with
/// event processing.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
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
    pub resource_count: usize,
}

impl Inventory {
    pub fn shared(policy: ScoringPolicy, on_change: Option<OnChange>) -> SharedInventory {
        Arc::new(Self {
            policy,
            store: RwLock::new(Store::default()),
            stats: RwLock::new(InventoryStats::default()),
            on_change,
        })
    }

    /// Scores and stores a catalog object. Returns the scored entry, or None
    /// when the event was a no-op (unchanged resourceVersion).
    pub fn apply(&self, obj: &DynamicObject, now: DateTime<Utc>) -> Option<VerifiedResource> {
        self.record_event(now);

        let mut res = extract_resource(obj);
        let key = format!("{}/{}", res.namespace, res.name);

        {
            let store = self.store.read();
            if let Some(existing) = store.resources.get(&key) {
                if existing.resource_version == res.resource_version {
                    return None;
                }
            }
        }

        res.verified_score = score_catalog(&res, &self.policy, now);
        res.last_scored = Some(now);

        {
            let mut store = self.store.write();
            store.resources.insert(key, res.clone());
            store.summary = summarize(&store.resources, &self.policy, now);
        }
        self.record_reconcile(now);
        Some(res)
    }

    /// Removes an entry by key. Returns true when something was removed.
    pub fn delete(&self, namespace: &str, name: &str, now: DateTime<Utc>) -> bool {
        self.record_event(now);
        let key = format!("{namespace}/{name}");
        let removed = {
            let mut store = self.store.write();
            let removed = store.resources.remove(&key).is_some();
            if removed {
                store.summary = summarize(&store.resources, &self.policy, now);
            }
            removed
        };
        if removed {
            self.record_reconcile(now);
        }
        removed
    }

    /// Fires the on-change signal. Called by the event pump after the store
    /// lock is released so handlers may freely read back.
    pub fn notify(&self) {
        if let Some(on_change) = &self.on_change {
            on_change();
        }
    }

    pub fn resources(&self) -> Vec<VerifiedResource> {
        let store = self.store.read();
        let mut all: Vec<VerifiedResource> = store.resources.values().cloned().collect();
        all.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        all
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<VerifiedResource> {
        self.store.read().resources.get(&format!("{namespace}/{name}")).cloned()
    }

    pub fn summary(&self) -> VerifiedSummary {
        self.store.read().summary.clone()
    }

    /// The embeddable catalog scores for evaluation results, in stable order.
    pub fn catalog_scores(&self) -> Vec<CatalogScore> {
        self.resources().iter().map(VerifiedResource::catalog_score).collect()
    }

    pub fn stats(&self) -> InventoryStats {
        let mut stats = self.stats.read().clone();
        stats.resource_count = self.store.read().resources.len();
        stats
    }

    fn record_event(&self, now: DateTime<Utc>) {
        let mut stats = self.stats.write();
        stats.last_event = Some(now);
        stats.event_count += 1;
    }

    fn record_reconcile(&self, now: DateTime<Utc>) {
        let mut stats = self.stats.write();
        stats.last_reconcile = Some(now);
        stats.reconcile_count += 1;
    }
}

fn summarize(
    resources: &HashMap<String, VerifiedResource>,
    policy: &ScoringPolicy,
    now: DateTime<Utc>,
) -> VerifiedSummary {
    let mut summary = VerifiedSummary {
        last_reconcile: Some(now),
        ..Default::default()
    };
    let mut total_score = 0u32;
    for res in resources.values() {
        summary.total_catalogs += 1;
        summary.total_scored += 1;
        total_score += res.verified_score.score;
        summary.total_tools += res.tool_count;
        summary.total_agent_usages += res.used_by_agents.len();

        let score = res.verified_score.score;
        if score >= policy.verified_threshold {
            summary.verified_count += 1;
        } else if score >= policy.unverified_threshold {
            summary.unverified_count += 1;
        } else {
            summary.rejected_count += 1;
            summary.critical_count += 1;
        }
    }
    if summary.total_catalogs > 0 {
        summary.average_score = total_score / summary.total_catalogs as u32;
    }
    summary
}

/// Watches catalog entries, scoring each independently on add/update and
/// removing on delete. Patch failures are logged and never fail the event.
pub async fn run(inventory: SharedInventory, client: Client, patcher: Option<StatusPatcher>) {
    let api = dynamic_api(client, ResourceKind::McpServerCatalog);
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);

    tracing::info!("catalog watcher started");
    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Applied(obj)) => {
                handle_applied(&inventory, &obj, patcher.as_ref()).await;
            }
            Ok(watcher::Event::Deleted(obj)) => {
                let namespace = obj.namespace().unwrap_or_default();
                let name = obj.name_any();
                if inventory.delete(&namespace, &name, Utc::now()) {
                    tracing::info!(%namespace, %name, "catalog entry removed");
                    inventory.notify();
                }
            }
            Ok(watcher::Event::Restarted(objs)) => {
                for obj in &objs {
                    handle_applied(&inventory, obj, patcher.as_ref()).await;
                }
            }
            Err(error) => {
                tracing::info!(%error, "catalog watch interrupted; retrying");
            }
        }
    }
}

async fn handle_applied(
    inventory: &SharedInventory,
    obj: &DynamicObject,
    patcher: Option<&StatusPatcher>,
) {
    let Some(res) = inventory.apply(obj, Utc::now()) else {
        return;
    };
    tracing::info!(
        namespace = %res.namespace,
        name = %res.name,
        score = res.verified_score.score,
        status = %res.verified_score.status,
        grade = %res.verified_score.grade,
        "catalog entry scored",
    );
    if let Some(patcher) = patcher {
        if let Err(error) = patcher.patch_catalog_status(&res).await {
            tracing::warn!(
                namespace = %res.namespace,
                name = %res.name,
                %error,
                "failed to patch catalog status",
            );
        }
    }
    inventory.notify();
}
