use crate::error::{ExporterError, Result};
use crate::models::ServiceRegistration;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Sink for service registrations.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn register_service(&self, registration: &ServiceRegistration) -> Result<()>;
}

/// Connection settings for the Consul agent HTTP API.
#[derive(Debug, Clone, Default)]
pub struct ConsulConfig {
    pub address: String,
    pub datacenter: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// [`ServiceRegistry`] talking to a Consul agent.
pub struct ConsulClient {
    http: Client,
    base_url: String,
    config: ConsulConfig,
}

impl ConsulClient {
    /// Builds the HTTP client. Fails only if the TLS backend cannot be initialized.
    pub fn new(config: ConsulConfig) -> Result<Self> {
        let http = Client::builder().build()?;
        let base_url = if config.address.contains("://") {
            config.address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", config.address.trim_end_matches('/'))
        };

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ServiceRegistry for ConsulClient {
    async fn register_service(&self, registration: &ServiceRegistration) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.base_url());
        debug!("PUT {} ({})", url, registration.id);

        let mut request = self.http.put(&url).json(registration);

        if !self.config.datacenter.is_empty() {
            request = request.query(&[("dc", self.config.datacenter.as_str())]);
        }
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header("X-Consul-Token", token);
        }
        if let (Some(username), Some(password)) = (
            self.config.username.as_deref().filter(|u| !u.is_empty()),
            self.config.password.as_deref().filter(|p| !p.is_empty()),
        ) {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExporterError::RegistryRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
