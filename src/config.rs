use crate::error::{ExporterError, Result};
use crate::services::helpers::consul_helper::ConsulConfig;
use crate::services::registration::{
    RegistrationSettings, RetryPolicy, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_PORT,
};
use crate::services::scrape_loop::DEFAULT_SCRAPE_INTERVAL;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "docker-metrics-exporter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exports docker container stats as Prometheus metrics", long_about = None)]
pub struct Config {
    #[arg(long, env = "DEBUG_MODE", help = "enable app debug mode")]
    pub debug: bool,

    #[arg(
        long,
        env = "CONSUL_ADDRESS",
        default_value = "127.0.0.1:8500",
        help = "address of the Consul server"
    )]
    pub consul_address: String,

    #[arg(
        long = "consul-dc",
        env = "CONSUL_DATACENTER",
        default_value = "prometheus",
        help = "Consul datacenter to use"
    )]
    pub consul_datacenter: String,

    #[arg(long, env = "CONSUL_TOKEN", help = "per-request Consul ACL token")]
    pub consul_token: Option<String>,

    #[arg(long, env = "CONSUL_USERNAME", help = "Consul username for httpAuth mode")]
    pub consul_username: Option<String>,

    #[arg(long, env = "CONSUL_PASSWORD", help = "Consul password for httpAuth mode")]
    pub consul_password: Option<String>,

    #[arg(
        long,
        env = "CONSUL_SERVICE_NAME",
        default_value = DEFAULT_SERVICE_NAME,
        help = "service name registered in Consul"
    )]
    pub service_name: String,

    #[arg(long, env = "CONSUL_SERVICE_ID", help = "service ID registered in Consul")]
    pub service_id: Option<String>,

    #[arg(long, env = "CONSUL_SERVICE_IP", help = "service ip registered in Consul")]
    pub service_ip: Option<String>,

    #[arg(
        long,
        env = "CONSUL_SERVICE_PORT",
        default_value_t = u32::from(DEFAULT_SERVICE_PORT),
        help = "service port registered in Consul"
    )]
    pub service_port: u32,

    #[arg(
        long,
        env = "CONSUL_SERVICE_TAG",
        value_delimiter = ',',
        help = "service tags registered in Consul"
    )]
    pub service_tags: Vec<String>,

    #[arg(
        long,
        env = "SERVER_ADDR",
        default_value = ":8000",
        help = "address the HTTP server listens on"
    )]
    pub server_addr: String,

    #[arg(
        long = "no-register",
        env = "CONSUL_DISABLED",
        help = "do not register the service in Consul"
    )]
    pub no_register: bool,

    #[arg(
        long,
        env = "CONSUL_REGISTER_ATTEMPTS",
        default_value_t = 3,
        help = "registration attempts before giving up"
    )]
    pub register_attempts: u32,

    #[arg(
        long,
        env = "CONSUL_REGISTER_BACKOFF",
        default_value_t = 2,
        help = "seconds to wait between registration attempts"
    )]
    pub register_backoff_secs: u64,

    #[arg(
        long,
        env = "SCRAPE_INTERVAL",
        default_value_t = DEFAULT_SCRAPE_INTERVAL.as_secs(),
        help = "seconds between container stats scrapes"
    )]
    pub scrape_interval_secs: u64,
}

impl Config {
    /// Parses `server_addr`. A bare `:port` listens on every IPv4 interface.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = if self.server_addr.starts_with(':') {
            format!("0.0.0.0{}", self.server_addr)
        } else {
            self.server_addr.clone()
        };

        addr.parse().map_err(|e| {
            ExporterError::Config(format!("invalid server address {}: {}", self.server_addr, e))
        })
    }

    pub fn register_enabled(&self) -> bool {
        !self.no_register
    }

    pub fn consul_config(&self) -> ConsulConfig {
        ConsulConfig {
            address: self.consul_address.clone(),
            datacenter: self.consul_datacenter.clone(),
            token: self.consul_token.clone(),
            username: self.consul_username.clone(),
            password: self.consul_password.clone(),
        }
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            service_name: self.service_name.clone(),
            service_id: self.service_id.clone(),
            service_address: self.service_ip.clone(),
            service_port: self.service_port,
            tags: self
                .service_tags
                .iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.register_attempts,
            backoff: Duration::from_secs(self.register_backoff_secs),
        }
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs.max(1))
    }
}
