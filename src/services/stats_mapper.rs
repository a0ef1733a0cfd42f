use crate::metrics::MetricCatalog;
use crate::models::{strip_name_prefix, ContainerRef, RawStatsRecord};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("Container ID inconsistent: listed {expected}, stats record carries {found}")]
    IdentityMismatch { expected: String, found: String },
}

/// Applies one raw stats record to the shared metric catalog.
#[derive(Clone)]
pub struct StatsMapper {
    catalog: Arc<MetricCatalog>,
}

impl StatsMapper {
    pub fn new(catalog: Arc<MetricCatalog>) -> Self {
        Self { catalog }
    }

    /// Validates `record` against `container` and writes every gauge it can
    /// derive from it.
    ///
    /// A missing `rss` entry only skips that gauge. On success the per-cycle
    /// stats counter is incremented.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::IdentityMismatch`] without touching the catalog when
    /// the record belongs to another container.
    pub fn map(&self, container: &ContainerRef, record: &RawStatsRecord) -> Result<(), MapError> {
        if record.id != container.id {
            return Err(MapError::IdentityMismatch {
                expected: container.id.clone(),
                found: record.id.clone(),
            });
        }

        let name = match strip_name_prefix(&record.name) {
            "" => container.name.as_str(),
            name => name,
        };
        let id = container.short_id();
        let labels = [name, id];
        let catalog = &self.catalog;

        catalog
            .memory_limit
            .with_label_values(&labels)
            .set(record.memory.limit as f64);
        catalog
            .memory_usage
            .with_label_values(&labels)
            .set(record.memory.usage as f64);
        match record.memory.stats.get("rss") {
            Some(rss) => catalog.memory_rss.with_label_values(&labels).set(*rss as f64),
            None => warn!(container_name = name, container_id = id, "stats not rss field"),
        }

        let cpu = &record.cpu;
        catalog
            .cpu_user
            .with_label_values(&labels)
            .set(cpu.cpu_usage.usage_in_usermode as f64);
        catalog
            .cpu_kernel
            .with_label_values(&labels)
            .set(cpu.cpu_usage.usage_in_kernelmode as f64);
        catalog
            .cpu_all
            .with_label_values(&labels)
            .set(cpu.cpu_usage.total_usage as f64);
        catalog
            .cpu_system
            .with_label_values(&labels)
            .set(cpu.system_cpu_usage as f64);

        for (interface, network) in &record.networks {
            let labels = [name, id, interface.as_str()];
            catalog
                .rx_bytes
                .with_label_values(&labels)
                .set(network.rx_bytes as f64);
            catalog
                .rx_packets
                .with_label_values(&labels)
                .set(network.rx_packets as f64);
            catalog
                .tx_bytes
                .with_label_values(&labels)
                .set(network.tx_bytes as f64);
            catalog
                .tx_packets
                .with_label_values(&labels)
                .set(network.tx_packets as f64);
        }

        catalog.record_container_success();
        debug!(
            container_name = name,
            container_id = id,
            interfaces = record.networks.len(),
            "mapped container stats"
        );
        Ok(())
    }
}
