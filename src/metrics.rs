//! Prometheus metric catalog for docker container statistics.
//!
//! The catalog is constructed once at startup and shared behind an `Arc`
//! between the scrape loop, every per-container mapping task and the HTTP
//! front. Individual series updates are atomic; rendering is consistent per
//! series only.

use crate::error::Result;
use prometheus::{Encoder, GaugeVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Labels shared by the memory and cpu gauges.
pub const CONTAINER_LABELS: &[&str] = &["container_name", "container_id"];
/// Labels of the per-interface network gauges.
pub const NETWORK_LABELS: &[&str] = &["container_name", "container_id", "interface"];

pub struct MetricCatalog {
    registry: Registry,

    pub memory_limit: GaugeVec,
    pub memory_usage: GaugeVec,
    pub memory_rss: GaugeVec,

    pub cpu_user: GaugeVec,
    pub cpu_kernel: GaugeVec,
    pub cpu_all: GaugeVec,
    pub cpu_system: GaugeVec,

    pub rx_bytes: GaugeVec,
    pub rx_packets: GaugeVec,
    pub tx_bytes: GaugeVec,
    pub tx_packets: GaugeVec,

    pub scrape_total: IntCounter,
    pub stats_num: IntGauge,
    pub scrape_overlap_total: IntCounter,
}

impl MetricCatalog {
    /// Creates every metric and registers it with a fresh registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let memory_limit = define_gauge(
            &registry,
            "docker_container_memory_stats_limit",
            "Memory Limit.",
            CONTAINER_LABELS,
        )?;
        let memory_usage = define_gauge(
            &registry,
            "docker_container_memory_stats_usage",
            "Total memory usage, include Virtual Memory Size.",
            CONTAINER_LABELS,
        )?;
        let memory_rss = define_gauge(
            &registry,
            "docker_container_memory_stats_rss",
            "Resident Memory Size.",
            CONTAINER_LABELS,
        )?;

        let cpu_user = define_gauge(
            &registry,
            "docker_container_cpu_stats_usermode",
            "time running un-niced user processes.",
            CONTAINER_LABELS,
        )?;
        let cpu_kernel = define_gauge(
            &registry,
            "docker_container_cpu_stats_kernelmode",
            "time running kernel processes.",
            CONTAINER_LABELS,
        )?;
        let cpu_all = define_gauge(
            &registry,
            "docker_container_cpu_stats_all",
            "total cpu time for container.",
            CONTAINER_LABELS,
        )?;
        let cpu_system = define_gauge(
            &registry,
            "docker_container_cpu_stats_system",
            "host total cpu time.",
            CONTAINER_LABELS,
        )?;

        let rx_bytes = define_gauge(
            &registry,
            "docker_container_networks_rx_bytes",
            "network received bytes.",
            NETWORK_LABELS,
        )?;
        let rx_packets = define_gauge(
            &registry,
            "docker_container_networks_rx_packets",
            "network received packets.",
            NETWORK_LABELS,
        )?;
        let tx_bytes = define_gauge(
            &registry,
            "docker_container_networks_tx_bytes",
            "network send bytes.",
            NETWORK_LABELS,
        )?;
        let tx_packets = define_gauge(
            &registry,
            "docker_container_networks_tx_packets",
            "network send packets.",
            NETWORK_LABELS,
        )?;

        let scrape_total =
            IntCounter::new("docker_container_scrape_total", "the number of scrape.")?;
        registry.register(Box::new(scrape_total.clone()))?;

        let stats_num = IntGauge::new(
            "docker_container_stats_num",
            "The amount of docker container stats",
        )?;
        registry.register(Box::new(stats_num.clone()))?;

        let scrape_overlap_total = IntCounter::new(
            "docker_container_scrape_overlap_total",
            "Scrape cycles whose container work outlived the scrape interval.",
        )?;
        registry.register(Box::new(scrape_overlap_total.clone()))?;

        Ok(Self {
            registry,
            memory_limit,
            memory_usage,
            memory_rss,
            cpu_user,
            cpu_kernel,
            cpu_all,
            cpu_system,
            rx_bytes,
            rx_packets,
            tx_bytes,
            tx_packets,
            scrape_total,
            stats_num,
            scrape_overlap_total,
        })
    }

    /// Marks the start of a scrape cycle.
    pub fn begin_cycle(&self) {
        self.scrape_total.inc();
        self.stats_num.set(0);
    }

    pub fn record_container_success(&self) {
        self.stats_num.inc();
    }

    pub fn record_overlap(&self) {
        self.scrape_overlap_total.inc();
    }

    /// Renders the current value of every series in the Prometheus text format.
    pub fn render(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn define_gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), label_names)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_unlabeled_series() {
        let catalog = MetricCatalog::new().unwrap();
        catalog.begin_cycle();

        let text = String::from_utf8(catalog.render().unwrap()).unwrap();
        assert!(text.contains("docker_container_scrape_total 1"));
        assert!(text.contains("docker_container_stats_num 0"));
        assert!(text.contains("# TYPE docker_container_scrape_total counter"));
        assert!(text.contains("# TYPE docker_container_stats_num gauge"));
    }

    #[test]
    fn test_begin_cycle_resets_stats_num() {
        let catalog = MetricCatalog::new().unwrap();
        catalog.begin_cycle();
        catalog.record_container_success();
        catalog.record_container_success();
        assert_eq!(catalog.stats_num.get(), 2);

        catalog.begin_cycle();
        assert_eq!(catalog.stats_num.get(), 0);
        assert_eq!(catalog.scrape_total.get(), 2);
    }

    #[test]
    fn test_render_is_stable_without_writes() {
        let catalog = MetricCatalog::new().unwrap();
        catalog
            .memory_limit
            .with_label_values(&["web", "abc1234567"])
            .set(1024.0);
        catalog
            .memory_limit
            .with_label_values(&["db", "def1234567"])
            .set(2048.0);
        catalog
            .rx_bytes
            .with_label_values(&["web", "abc1234567", "eth0"])
            .set(10.0);

        let first = catalog.render().unwrap();
        let second = catalog.render().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic]
    fn test_label_arity_mismatch_panics() {
        let catalog = MetricCatalog::new().unwrap();
        catalog.rx_bytes.with_label_values(&["web", "abc1234567"]).set(1.0);
    }

    #[test]
    fn test_content_type_is_text_format() {
        let catalog = MetricCatalog::new().unwrap();
        assert!(catalog.content_type().starts_with("text/plain"));
    }
}
