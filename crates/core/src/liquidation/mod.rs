//! Liquidation engine: pool discovery and per-pool check-and-liquidate loops.
//!
//! Pools are identified by id across chains. A pool loop only acts on the
//! chains where discovery saw the pool, so a pool id known on one chain is
//! never liquidated on another.

mod executor;

pub use executor::{execute_liquidation, LiquidationPath, LiquidationResult};

use dashmap::DashMap;
use parking_lot::Mutex;
use relayer_chain::LendingContract;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{LiquidationSettings, PoolConfig};
use crate::retry::RetryPolicy;
use crate::status::LiquidationStatus;

/// Liquidation processor.
#[derive(Debug)]
pub struct LiquidationProcessor {
    settings: LiquidationSettings,
    lenders: HashMap<u64, Arc<dyn LendingContract>>,
    policy: RetryPolicy,
    /// Pool ids seen by discovery, per chain.
    pools_by_chain: DashMap<u64, HashSet<u64>>,
    configs: DashMap<u64, PoolConfig>,
    tasks: DashMap<u64, JoinHandle<()>>,
    running: AtomicBool,
    /// Bumped on every start so loops of a previous run exit.
    generation: AtomicU64,
    shutdown: Notify,
    last_discovery: Mutex<Option<Instant>>,
    discovery_task: Mutex<Option<JoinHandle<()>>>,
}

impl LiquidationProcessor {
    pub fn new(
        settings: LiquidationSettings,
        lenders: HashMap<u64, Arc<dyn LendingContract>>,
        policy: RetryPolicy,
    ) -> Self {
        let configs = settings
            .pools
            .iter()
            .map(|p| (p.pool_id, p.clone()))
            .collect();

        Self {
            settings,
            lenders,
            policy,
            pools_by_chain: DashMap::new(),
            configs,
            tasks: DashMap::new(),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            shutdown: Notify::new(),
            last_discovery: Mutex::new(None),
            discovery_task: Mutex::new(None),
        }
    }

    /// Whether liquidation is switched on in the settings.
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run discovery, then spawn one loop per enabled pool and the periodic
    /// discovery task.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(chains = self.lenders.len(), "Starting liquidation processor");

        self.discover_pools().await;

        let enabled: Vec<u64> = self
            .configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.pool_id)
            .collect();
        for pool_id in enabled {
            self.spawn_pool_loop(pool_id);
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let interval = this.settings.discovery_interval();
            while this.wait_or_shutdown(generation, interval).await {
                this.discover_pools().await;
            }
            debug!("Discovery task stopped");
        });
        *self.discovery_task.lock() = Some(handle);
    }

    /// Stop all loops. In-flight liquidations finish.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();
        self.tasks.clear();
        self.discovery_task.lock().take();
        info!("Liquidation processor stopped");
    }

    /// Sleep for `duration` unless stopped first. Returns whether to continue.
    async fn wait_or_shutdown(&self, generation: u64, duration: std::time::Duration) -> bool {
        let mut notified = pin!(self.shutdown.notified());
        notified.as_mut().enable();
        if !self.is_current(generation) {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_current(generation),
            _ = notified => false,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Query every lending contract for its pools.
    ///
    /// Runs at most once per discovery interval. Unknown pools get a default
    /// config and, when enabled and running, their own loop. Returns the
    /// number of newly configured pools.
    pub async fn discover_pools(self: &Arc<Self>) -> usize {
        {
            let mut last = self.last_discovery.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.settings.discovery_interval() {
                    debug!("Skipping pool discovery, ran recently");
                    return 0;
                }
            }
            *last = Some(Instant::now());
        }

        let mut added = 0;
        for (chain_id, lending) in self.sorted_lenders() {
            let pools = match lending.list_pools().await {
                Ok(pools) => pools,
                Err(e) => {
                    warn!(chain_id, error = %format!("{e:#}"), "Pool discovery failed");
                    continue;
                }
            };
            debug!(chain_id, pools = pools.len(), "Discovered pools");
            self.pools_by_chain
                .entry(chain_id)
                .or_default()
                .extend(pools.iter().copied());

            for pool_id in pools {
                if self.configs.contains_key(&pool_id) {
                    continue;
                }
                let config = PoolConfig::discovered(pool_id, self.settings.auto_enable_discovered);
                let enabled = config.enabled;
                self.configs.insert(pool_id, config);
                added += 1;
                info!(chain_id, pool_id, enabled, "New pool configured");

                if enabled && self.is_running() {
                    self.spawn_pool_loop(pool_id);
                }
            }
        }
        added
    }

    /// Enable or disable one pool. Returns false for an unknown pool.
    pub fn set_pool_enabled(self: &Arc<Self>, pool_id: u64, enabled: bool) -> bool {
        match self.configs.get_mut(&pool_id) {
            Some(mut config) => config.enabled = enabled,
            None => return false,
        }

        if enabled {
            if self.is_running() {
                self.spawn_pool_loop(pool_id);
            }
        } else if let Some((_, handle)) = self.tasks.remove(&pool_id) {
            handle.abort();
        }
        info!(pool_id, enabled, "Pool toggled");
        true
    }

    /// One iteration of a pool loop: liquidate the pool on every chain where
    /// it was discovered.
    pub async fn run_pool_cycle(&self, pool_id: u64) -> Vec<(u64, LiquidationResult)> {
        let Some(pool) = self.configs.get(&pool_id).map(|c| c.clone()) else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for (chain_id, lending) in self.sorted_lenders() {
            let known = self
                .pools_by_chain
                .get(&chain_id)
                .is_some_and(|pools| pools.contains(&pool_id));
            if !known {
                continue;
            }

            let result = execute_liquidation(lending.as_ref(), &pool, &self.policy).await;
            if result.liquidated_count > 0 {
                info!(chain_id, pool_id, liquidated = result.liquidated_count, "Pool liquidated");
            }
            results.push((chain_id, result));
        }
        results
    }

    fn spawn_pool_loop(self: &Arc<Self>, pool_id: u64) {
        if self
            .tasks
            .get(&pool_id)
            .is_some_and(|handle| !handle.is_finished())
        {
            return;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            debug!(pool_id, "Pool loop started");
            loop {
                let Some(interval) = this
                    .configs
                    .get(&pool_id)
                    .filter(|c| c.enabled)
                    .map(|c| c.check_interval())
                else {
                    break;
                };
                if !this.is_current(generation) {
                    break;
                }
                this.run_pool_cycle(pool_id).await;
                if !this.wait_or_shutdown(generation, interval).await {
                    break;
                }
            }
            debug!(pool_id, "Pool loop stopped");
        });
        self.tasks.insert(pool_id, handle);
    }

    fn sorted_lenders(&self) -> Vec<(u64, Arc<dyn LendingContract>)> {
        let mut lenders: Vec<_> = self
            .lenders
            .iter()
            .map(|(id, lending)| (*id, Arc::clone(lending)))
            .collect();
        lenders.sort_by_key(|(id, _)| *id);
        lenders
    }

    /// Distinct pool ids seen on any chain.
    pub fn discovered_pool_count(&self) -> usize {
        self.pools_by_chain
            .iter()
            .flat_map(|entry| entry.value().iter().copied().collect::<Vec<_>>())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn pool_config(&self, pool_id: u64) -> Option<PoolConfig> {
        self.configs.get(&pool_id).map(|c| c.clone())
    }

    pub fn status(&self) -> LiquidationStatus {
        LiquidationStatus {
            enabled: self.settings.enabled,
            running: self.is_running(),
            configured_pools: self.configs.len(),
            enabled_pools: self.configs.iter().filter(|c| c.enabled).count(),
            active_loops: self.tasks.iter().filter(|t| !t.is_finished()).count(),
        }
    }
}
