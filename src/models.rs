use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Length of the container id prefix used as the `container_id` label.
pub const SHORT_ID_LEN: usize = 10;

/// A running container as reported by the runtime. Identity is the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
}

impl ContainerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: strip_name_prefix(&name.into()).to_string(),
        }
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Docker reports container names with a leading `/`.
pub fn strip_name_prefix(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Point-in-time stats snapshot for one container, shaped like the docker
/// engine stats payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawStatsRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "memory_stats", default, deserialize_with = "null_as_default")]
    pub memory: MemoryStats,
    #[serde(rename = "cpu_stats", default, deserialize_with = "null_as_default")]
    pub cpu: CpuStats,
    #[serde(default, deserialize_with = "null_as_default")]
    pub networks: HashMap<String, NetworkStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemoryStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub limit: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stats: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    #[serde(default, deserialize_with = "null_as_default")]
    pub system_cpu_usage: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub usage_in_usermode: u64,
    #[serde(default)]
    pub usage_in_kernelmode: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub rx_packets: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub tx_packets: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Service descriptor submitted to the discovery registry.
///
/// Serializes to the Consul agent service registration payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: HealthCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub url: String,
    pub method: String,
    pub interval: String,
    pub timeout: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_ref_strips_leading_slash() {
        let container = ContainerRef::new("abc1234567890", "/web");
        assert_eq!(container.name, "web");
        assert_eq!(container.short_id(), "abc1234567");
    }

    #[test]
    fn test_short_id_keeps_short_ids() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id(""), "");
    }

    #[test]
    fn test_stats_record_from_engine_json() {
        let payload = r#"{
            "id": "abc1234567",
            "name": "/web",
            "read": "2024-01-01T00:00:00Z",
            "memory_stats": {"limit": 1073741824, "usage": 52428800, "stats": {"rss": 20971520, "cache": 4096}},
            "cpu_stats": {
                "cpu_usage": {"total_usage": 150, "usage_in_usermode": 100, "usage_in_kernelmode": 50, "percpu_usage": [75, 75]},
                "system_cpu_usage": 900000,
                "online_cpus": 2
            },
            "networks": {"eth0": {"rx_bytes": 1000, "rx_packets": 10, "tx_bytes": 2000, "tx_packets": 20, "rx_errors": 0}}
        }"#;

        let record: RawStatsRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(record.id, "abc1234567");
        assert_eq!(record.memory.limit, 1073741824);
        assert_eq!(record.memory.stats.get("rss"), Some(&20971520));
        assert_eq!(record.cpu.cpu_usage.usage_in_kernelmode, 50);
        assert_eq!(record.cpu.system_cpu_usage, 900000);
        assert_eq!(record.networks["eth0"].tx_packets, 20);
    }

    #[test]
    fn test_stats_record_tolerates_null_sections() {
        let payload = r#"{"id": "x", "name": "/x", "memory_stats": {"stats": null}, "networks": null}"#;
        let record: RawStatsRecord = serde_json::from_str(payload).unwrap();
        assert!(record.networks.is_empty());
        assert!(record.memory.stats.is_empty());
        assert_eq!(record.memory.usage, 0);
    }

    #[test]
    fn test_registration_serializes_to_consul_payload() {
        let registration = ServiceRegistration {
            id: "prometheus-docker-metrics-0a1b2".to_string(),
            name: "prometheus-docker-metrics".to_string(),
            address: "10.0.0.5".to_string(),
            port: 8765,
            tags: vec!["docker".to_string()],
            check: HealthCheck {
                url: "http://10.0.0.5:8765/health".to_string(),
                method: "GET".to_string(),
                interval: "30s".to_string(),
                timeout: "3s".to_string(),
            },
        };

        let value = serde_json::to_value(&registration).unwrap();
        assert_eq!(value["ID"], "prometheus-docker-metrics-0a1b2");
        assert_eq!(value["Port"], 8765);
        assert_eq!(value["Tags"][0], "docker");
        assert_eq!(value["Check"]["HTTP"], "http://10.0.0.5:8765/health");
        assert_eq!(value["Check"]["Interval"], "30s");
    }
}
