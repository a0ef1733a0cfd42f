use crate::error::{ExporterError, Result};
use crate::models::{HealthCheck, ServiceRegistration};
use crate::services::helpers::consul_helper::ServiceRegistry;
use crate::services::helpers::net_helper::resolve_service_address;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_SERVICE_NAME: &str = "prometheus-docker-metrics";
pub const SERVICE_ID_PREFIX: &str = "prometheus-docker-metrics-";
pub const SERVICE_ID_SUFFIX_LEN: usize = 5;
pub const DEFAULT_SERVICE_PORT: u16 = 8765;
pub const HEALTH_CHECK_INTERVAL: &str = "30s";
pub const HEALTH_CHECK_TIMEOUT: &str = "3s";

/// Inputs for the registration descriptor. Unset fields are defaulted by
/// [`build_registration`].
#[derive(Debug, Clone, Default)]
pub struct RegistrationSettings {
    pub service_name: String,
    pub service_id: Option<String>,
    pub service_address: Option<String>,
    pub service_port: u32,
    pub tags: Vec<String>,
}

/// Builds the service descriptor, filling in generated id, detected address
/// and default port where the settings leave them open.
pub fn build_registration(settings: &RegistrationSettings) -> ServiceRegistration {
    let name = if settings.service_name.is_empty() {
        DEFAULT_SERVICE_NAME.to_string()
    } else {
        settings.service_name.clone()
    };

    let id = match settings.service_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            let id = generate_service_id();
            warn!("Consul service id is not setting, use default {}", id);
            id
        }
    };

    let address = match settings.service_address.as_deref().filter(|a| !a.is_empty()) {
        Some(address) => address.to_string(),
        None => {
            let address = resolve_service_address(None);
            warn!("Consul service ip is not setting, use container ip {}", address);
            address
        }
    };

    let port = match u16::try_from(settings.service_port) {
        Ok(port) if port != 0 => port,
        _ => {
            warn!(
                "Consul service port {} invalid, use default ({})",
                settings.service_port, DEFAULT_SERVICE_PORT
            );
            DEFAULT_SERVICE_PORT
        }
    };

    let check = HealthCheck {
        url: format!("http://{}:{}/health", address, port),
        method: "GET".to_string(),
        interval: HEALTH_CHECK_INTERVAL.to_string(),
        timeout: HEALTH_CHECK_TIMEOUT.to_string(),
    };

    ServiceRegistration {
        id,
        name,
        address,
        port,
        tags: settings.tags.clone(),
        check,
    }
}

/// Fixed prefix plus five random lowercase hex characters.
pub fn generate_service_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}{}", SERVICE_ID_PREFIX, &random[..SERVICE_ID_SUFFIX_LEN])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Submits the service descriptor to the discovery registry once at startup.
pub struct RegistrationAgent<R> {
    registry: R,
    policy: RetryPolicy,
}

impl<R: ServiceRegistry> RegistrationAgent<R> {
    pub fn new(registry: R, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    /// Registers `registration`, retrying with a fixed backoff.
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::RegistrationFailed`] carrying the last error once
    /// every attempt has been used.
    pub async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.registry.register_service(registration).await {
                Ok(()) => {
                    info!(
                        "Register consul service: {}, {}, {}, {}",
                        registration.name, registration.id, registration.address, registration.port
                    );
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Register Consul service error (attempt {}/{}): {}",
                        attempt, attempts, e
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ExporterError::RegistrationFailed {
                        attempts,
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Registry that rejects the first `failures` calls.
    #[derive(Default)]
    struct FlakyRegistry {
        failures: u32,
        calls: AtomicU32,
        registered: Mutex<Vec<ServiceRegistration>>,
    }

    #[async_trait]
    impl ServiceRegistry for Arc<FlakyRegistry> {
        async fn register_service(&self, registration: &ServiceRegistration) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(ExporterError::RegistryRejected {
                    status: 503,
                    body: "no leader".to_string(),
                });
            }
            self.registered.lock().unwrap().push(registration.clone());
            Ok(())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_defaults_fill_id_address_and_port() {
        let registration = build_registration(&RegistrationSettings::default());

        assert_eq!(registration.name, DEFAULT_SERVICE_NAME);
        assert_eq!(registration.port, DEFAULT_SERVICE_PORT);
        assert!(!registration.address.is_empty());

        let suffix = registration.id.strip_prefix(SERVICE_ID_PREFIX).unwrap();
        assert_eq!(suffix.len(), SERVICE_ID_SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        assert_eq!(
            registration.check.url,
            format!("http://{}:{}/health", registration.address, DEFAULT_SERVICE_PORT)
        );
        assert_eq!(registration.check.method, "GET");
        assert_eq!(registration.check.interval, HEALTH_CHECK_INTERVAL);
        assert_eq!(registration.check.timeout, HEALTH_CHECK_TIMEOUT);
    }

    #[test]
    fn test_explicit_settings_are_kept() {
        let registration = build_registration(&RegistrationSettings {
            service_name: "exporter".to_string(),
            service_id: Some("exporter-1".to_string()),
            service_address: Some("192.168.1.20".to_string()),
            service_port: 9100,
            tags: vec!["docker".to_string()],
        });

        assert_eq!(registration.id, "exporter-1");
        assert_eq!(registration.name, "exporter");
        assert_eq!(registration.address, "192.168.1.20");
        assert_eq!(registration.port, 9100);
        assert_eq!(registration.tags, vec!["docker".to_string()]);
        assert_eq!(registration.check.url, "http://192.168.1.20:9100/health");
    }

    #[test]
    fn test_out_of_range_port_falls_back_to_default() {
        for service_port in [0, 65536, 70000] {
            let registration = build_registration(&RegistrationSettings {
                service_address: Some("10.0.0.1".to_string()),
                service_port,
                ..Default::default()
            });
            assert_eq!(registration.port, DEFAULT_SERVICE_PORT);
            assert_eq!(registration.check.url, "http://10.0.0.1:8765/health");
        }

        let registration = build_registration(&RegistrationSettings {
            service_address: Some("10.0.0.1".to_string()),
            service_port: 65535,
            ..Default::default()
        });
        assert_eq!(registration.port, 65535);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_service_id(), generate_service_id());
    }

    #[tokio::test]
    async fn test_register_succeeds_first_try() {
        let registry = Arc::new(FlakyRegistry::default());
        let agent = RegistrationAgent::new(registry.clone(), fast_policy(3));
        let registration = build_registration(&RegistrationSettings {
            service_address: Some("10.0.0.1".to_string()),
            ..Default::default()
        });

        agent.register(&registration).await.unwrap();

        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.registered.lock().unwrap()[0], registration);
    }

    #[tokio::test]
    async fn test_register_retries_until_success() {
        let registry = Arc::new(FlakyRegistry {
            failures: 2,
            ..Default::default()
        });
        let agent = RegistrationAgent::new(registry.clone(), fast_policy(3));
        let registration = build_registration(&RegistrationSettings::default());

        agent.register(&registration).await.unwrap();
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_register_gives_up_after_max_attempts() {
        let registry = Arc::new(FlakyRegistry {
            failures: 10,
            ..Default::default()
        });
        let agent = RegistrationAgent::new(registry.clone(), fast_policy(2));
        let registration = build_registration(&RegistrationSettings::default());

        let err = agent.register(&registration).await.unwrap_err();
        assert!(matches!(
            err,
            ExporterError::RegistrationFailed { attempts: 2, .. }
        ));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
        assert!(registry.registered.lock().unwrap().is_empty());
    }
}
