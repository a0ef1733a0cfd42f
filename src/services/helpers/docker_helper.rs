use crate::error::{ExporterError, Result};
use crate::models::{
    short_id, ContainerRef, CpuStats, CpuUsage, MemoryStats, NetworkStats, RawStatsRecord,
};
use async_trait::async_trait;
use bollard::container::{ListContainersOptions, MemoryStatsStats, Stats, StatsOptions};
use bollard::models::ContainerSummary;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// Source of container inventory and per-container stats.
#[async_trait]
pub trait ContainerSource: Send + Sync {
    /// Lists the currently running containers.
    async fn list_containers(&self) -> Result<Vec<ContainerRef>>;

    /// Fetches a single stats snapshot for the container with the given id.
    async fn fetch_stats(&self, id: &str) -> Result<RawStatsRecord>;
}

/// [`ContainerSource`] backed by the local docker daemon.
pub struct DockerSource {
    docker: Docker,
}

impl DockerSource {
    /// Connects using the docker defaults for this platform (`DOCKER_HOST`
    /// or the local socket).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerSource for DockerSource {
    async fn list_containers(&self) -> Result<Vec<ContainerRef>> {
        let options = Some(ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;

        Ok(containers
            .into_iter()
            .filter_map(container_ref_from_summary)
            .collect())
    }

    async fn fetch_stats(&self, id: &str) -> Result<RawStatsRecord> {
        let options = Some(StatsOptions {
            stream: false,
            one_shot: false,
        });

        let mut stats_stream = self.docker.stats(id, options);

        match stats_stream.next().await {
            Some(stats) => Ok(record_from_stats(stats?)),
            None => Err(ExporterError::EmptyStats(id.to_string())),
        }
    }
}

fn container_ref_from_summary(summary: ContainerSummary) -> Option<ContainerRef> {
    let id = summary.id?;
    let name = summary
        .names
        .and_then(|names| names.into_iter().next())
        .unwrap_or_else(|| short_id(&id).to_string());

    Some(ContainerRef::new(id, name))
}

/// Flattens the daemon stats payload into the fields the exporter maps.
///
/// `rss` only exists on cgroup v1 hosts.
fn record_from_stats(stats: Stats) -> RawStatsRecord {
    let mut memory_stats = HashMap::new();
    if let Some(MemoryStatsStats::V1(v1)) = &stats.memory_stats.stats {
        memory_stats.insert("rss".to_string(), v1.rss);
    }

    let networks = stats
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(interface, network)| {
            (
                interface,
                NetworkStats {
                    rx_bytes: network.rx_bytes,
                    rx_packets: network.rx_packets,
                    tx_bytes: network.tx_bytes,
                    tx_packets: network.tx_packets,
                },
            )
        })
        .collect();

    RawStatsRecord {
        id: stats.id,
        name: stats.name,
        memory: MemoryStats {
            limit: stats.memory_stats.limit.unwrap_or_default(),
            usage: stats.memory_stats.usage.unwrap_or_default(),
            stats: memory_stats,
        },
        cpu: CpuStats {
            cpu_usage: CpuUsage {
                total_usage: stats.cpu_stats.cpu_usage.total_usage,
                usage_in_usermode: stats.cpu_stats.cpu_usage.usage_in_usermode,
                usage_in_kernelmode: stats.cpu_stats.cpu_usage.usage_in_kernelmode,
            },
            system_cpu_usage: stats.cpu_stats.system_cpu_usage.unwrap_or_default(),
        },
        networks,
    }
}
