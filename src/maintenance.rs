//! Periodic housekeeping for in-memory state and stale rows.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::constants::timeouts;
use crate::db::{now_timestamp, with_timeout};
use crate::state::SharedState;

#[derive(Clone)]
pub struct Maintenance {
    state: Arc<SharedState>,
}

impl Maintenance {
    #[must_use]
    pub const fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// Spawns every loop. The handles are aborted on shutdown.
    #[must_use]
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let config = &self.state.config;
        let cooldown_every =
            Duration::from_secs(config.comments.cooldown_sweep_interval_seconds.max(1));
        let purge_every = Duration::from_secs(config.cache.purge_interval_seconds.max(1));
        let limiter_idle = Duration::from_secs(config.server.rate_limit_idle_seconds.max(1));

        let cooldown = {
            let this = self.clone();
            tokio::spawn(async move { this.cooldown_loop(cooldown_every).await })
        };
        let purge = {
            let this = self.clone();
            tokio::spawn(async move { this.purge_loop(purge_every).await })
        };
        let limiter = {
            let this = self.clone();
            tokio::spawn(async move { this.limiter_loop(limiter_idle).await })
        };

        info!("Maintenance loops started");
        vec![cooldown, purge, limiter]
    }

    async fn cooldown_loop(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            self.sweep_cooldowns();
        }
    }

    async fn purge_loop(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = self.purge_once().await {
                error!(event = "job_failed", job_name = "purge", error = %e, "Purge failed");
            }
        }
    }

    async fn limiter_loop(&self, idle: Duration) {
        let mut interval = tokio::time::interval(idle / 2);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = self.state.rate_limiter.retain_recent(idle);
            if removed > 0 {
                debug!(removed, "Evicted idle rate limit entries");
            }
        }
    }

    /// Drops cooldown entries past their retention.
    pub fn sweep_cooldowns(&self) -> usize {
        let retention = Duration::from_secs(self.state.config.comments.cooldown_retention_seconds);
        let removed = self.state.cooldown.sweep(retention);
        if removed > 0 {
            debug!(removed, "Swept comment cooldowns");
        }
        removed
    }

    /// Expires cache entries and clears sync codes that can no longer be used.
    pub async fn purge_once(&self) -> anyhow::Result<()> {
        let evicted = self.state.catalog.purge_expired().await;

        let now = now_timestamp();
        let cleared = with_timeout(
            timeouts::DB_QUERY,
            self.state.store.profiles().clear_expired_sync_codes(&now),
        )
        .await?;

        info!(
            event = "job_finished",
            job_name = "purge",
            cache_evicted = evicted,
            sync_codes_cleared = cleared,
            "Purge finished"
        );
        metrics::counter!("kappalib_cache_evictions_total")
            .increment(u64::try_from(evicted).unwrap_or(u64::MAX));
        Ok(())
    }
}
