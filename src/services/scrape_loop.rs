use crate::error::Result;
use crate::metrics::MetricCatalog;
use crate::models::ContainerRef;
use crate::services::helpers::docker_helper::ContainerSource;
use crate::services::stats_mapper::StatsMapper;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(60);

/// What happened during one scrape cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub containers: usize,
    pub overlapped: bool,
}

/// Polls the container source forever, mapping every container's stats into
/// the catalog once per interval.
///
/// Each cycle waits for its per-container tasks until `cycle_start +
/// interval`. Tasks still running at that point are detached and the next
/// cycle starts immediately; the overlap is counted in
/// `docker_container_scrape_overlap_total`.
pub struct ScrapeLoop {
    source: Arc<dyn ContainerSource>,
    catalog: Arc<MetricCatalog>,
    mapper: StatsMapper,
    interval: Duration,
}

impl ScrapeLoop {
    pub fn new(
        source: Arc<dyn ContainerSource>,
        catalog: Arc<MetricCatalog>,
        interval: Duration,
    ) -> Self {
        let mapper = StatsMapper::new(catalog.clone());
        Self {
            source,
            catalog,
            mapper,
            interval,
        }
    }

    /// Runs until listing containers fails, which is returned as fatal.
    pub async fn run(&self) -> Result<()> {
        loop {
            let outcome = self.run_cycle().await?;
            debug!(
                containers = outcome.containers,
                overlapped = outcome.overlapped,
                "scrape cycle finished"
            );
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let deadline = Instant::now() + self.interval;

        info!("Get Containers stats.");
        let containers = self.source.list_containers().await.map_err(|e| {
            error!("Get container list error: {}", e);
            e
        })?;

        self.catalog.begin_cycle();

        let mut tasks = JoinSet::new();
        for container in containers.iter().cloned() {
            let source = self.source.clone();
            let mapper = self.mapper.clone();
            tasks.spawn(scrape_container(source, mapper, container));
        }

        let drained = timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Container stats task failed: {}", e);
                }
            }
        })
        .await;

        let overlapped = match drained {
            Ok(()) => {
                sleep_until(deadline).await;
                false
            }
            Err(_) => {
                warn!(
                    "{} container stats task(s) outlived the {:?} scrape interval",
                    tasks.len(),
                    self.interval
                );
                tasks.detach_all();
                self.catalog.record_overlap();
                true
            }
        };

        Ok(CycleOutcome {
            containers: containers.len(),
            overlapped,
        })
    }
}

async fn scrape_container(
    source: Arc<dyn ContainerSource>,
    mapper: StatsMapper,
    container: ContainerRef,
) {
    let name = container.name.as_str();
    let short_id = container.short_id();
    info!(container_name = name, container_id = short_id, "Container");

    let record = match source.fetch_stats(&container.id).await {
        Ok(record) => record,
        Err(e) => {
            error!(
                container_name = name,
                container_id = short_id,
                "get container stats error: {}",
                e
            );
            return;
        }
    };

    if let Err(e) = mapper.map(&container, &record) {
        error!(container_name = name, container_id = short_id, "{}", e);
    }
}
