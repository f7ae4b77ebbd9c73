use crate::api::{self, ApiState};
use crate::metrics::Metrics;
use crate::reconcile::Orchestrator;
use crate::state::SharedState;
use crate::status::StatusWriter;
use crate::trends::TrendHistory;
use anyhow::{bail, Result};
use clap::Parser;
use mcp_governance_controller_inventory::{Inventory, ScoringPolicy, StatusPatcher};
use mcp_governance_controller_k8s_api::ResourceKind;
use mcp_governance_controller_k8s_discovery::Discoverer;
use mcp_governance_controller_k8s_watch as watch;
use parking_lot::RwLock;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "governance", about = "Governance controller for in-cluster MCP fabrics")]
pub struct Args {
    #[clap(
        long,
        default_value = "mcp_governance=info,warn",
        env = "MCP_GOVERNANCE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Address of the governance read API.
    #[clap(long, default_value = "0.0.0.0:8090")]
    api_addr: SocketAddr,

    /// Quiescence window for bursts of watch events.
    #[clap(long, default_value = "3000")]
    debounce_ms: u64,

    /// Interval of the unconditional resync trigger.
    #[clap(long, default_value = "300")]
    resync_secs: u64,

    /// Interval of the periodic re-evaluation, independent of watch events.
    #[clap(long, default_value = "30")]
    scan_interval_secs: u64,

    /// Comma-separated resource kinds to watch; defaults to the full set.
    #[clap(long)]
    watch_kinds: Option<String>,

    /// Deadline for status-subresource writes.
    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,

    /// Disables writing evaluation results to the governance policy status.
    #[clap(long)]
    status_updates_disabled: bool,

    /// Writes verified scores onto catalog objects' status.publisher.
    #[clap(long)]
    patch_catalog_status: bool,
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            api_addr,
            debounce_ms,
            resync_secs,
            scan_interval_secs,
            watch_kinds,
            patch_timeout_ms,
            status_updates_disabled,
            patch_catalog_status,
        } = self;

        // An unrecognized kind is the one fatal configuration error.
        let kinds = match &watch_kinds {
            Some(list) => list
                .split(',')
                .map(|name| name.trim().parse::<ResourceKind>())
                .collect::<Result<Vec<_>, _>>()?,
            None => ResourceKind::default_watched(),
        };
        let patch_timeout = Duration::from_millis(patch_timeout_ms);

        let mut prom = <Registry>::default();
        let metrics = Metrics::register(prom.sub_registry_with_prefix("mcp_governance"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = runtime.client();
        let shutdown = runtime.shutdown_handle();

        let discoverer = Discoverer::new(client.clone());
        let live = discoverer.probe().await;
        if !live {
            tracing::warn!("falling back to the simulated cluster snapshot");
        }

        let shared = SharedState::default();
        let trends = TrendHistory::default();
        let ai_result = Arc::new(RwLock::new(None));
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel::<String>();

        // The inventory re-scores catalog entries on its own watch events;
        // each change also triggers a cluster re-evaluation so the embedded
        // catalog scores stay current.
        let catalog_scoring = if live {
            discoverer.resolve_policy().await.catalog_scoring
        } else {
            Default::default()
        };
        let on_change: Box<dyn Fn() + Send + Sync> = {
            let trigger_tx = trigger_tx.clone();
            Box::new(move || {
                let _ = trigger_tx.send("catalog change".to_string());
            })
        };
        let inventory =
            Inventory::shared(ScoringPolicy::from_overrides(&catalog_scoring), Some(on_change));

        let mut watcher_handle = None;
        if live {
            let patcher = patch_catalog_status
                .then(|| StatusPatcher::new(client.clone(), patch_timeout));
            tokio::spawn(
                mcp_governance_controller_inventory::run(
                    Arc::clone(&inventory),
                    client.clone(),
                    patcher,
                )
                .instrument(info_span!("inventory")),
            );

            let config = watch::Config {
                kinds,
                debounce: Duration::from_millis(debounce_ms),
                resync: Duration::from_secs(resync_secs),
            };
            let (watcher, mut reasons) =
                watch::Watcher::spawn(client.clone(), config, shutdown.clone());
            watcher_handle = Some(Arc::new(watcher));
            let forward = trigger_tx.clone();
            tokio::spawn(async move {
                while let Some(reason) = reasons.recv().await {
                    if forward.send(reason).is_err() {
                        return;
                    }
                }
            });
        }

        // Periodic re-evaluation independent of watch events.
        {
            let trigger_tx = trigger_tx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let period = Duration::from_secs(scan_interval_secs.max(1));
                let mut ticker =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                let shutdown = shutdown.signaled();
                tokio::pin!(shutdown);
                loop {
                    tokio::select! {
                        _ = &mut shutdown => return,
                        _ = ticker.tick() => {
                            if trigger_tx.send("periodic re-evaluation".to_string()).is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }

        let status_writer = (live && !status_updates_disabled)
            .then(|| StatusWriter::new(client.clone(), patch_timeout));

        let mut orchestrator = Orchestrator {
            discoverer: live.then_some(discoverer),
            shared: shared.clone(),
            trends: trends.clone(),
            inventory: Arc::clone(&inventory),
            status_writer,
            metrics,
            ai_scorer: None,
            ai_gate: None,
            ai_result: Arc::clone(&ai_result),
        };
        orchestrator.reconcile("startup").await;
        tokio::spawn(orchestrator.run(trigger_rx).instrument(info_span!("reconcile")));

        let api_state = ApiState {
            shared,
            trends,
            inventory,
            watcher: watcher_handle,
            ai_result,
        };
        tokio::spawn(api::serve(api_addr, api_state, shutdown).instrument(info_span!("api")));

        if runtime.run().await.is_err() {
            bail!("aborted");
        }
        Ok(())
    }
}
