//! Server host: the state every request handler shares
//!
//! Holds only immutable configuration and the registered resources. Nothing
//! here is written after startup and nothing is request-scoped; each handler
//! builds its own credential context and passes it down.

use crate::config::GatewayConfig;
use crate::core::query::PageLimits;
use crate::server::registry::ResourceRegistry;

pub struct ServerHost {
    /// Page defaults and bounds applied to every listing
    pub limits: PageLimits,

    pub registry: ResourceRegistry,
}

impl ServerHost {
    pub fn new(config: &GatewayConfig, registry: ResourceRegistry) -> Self {
        Self {
            limits: config.limits.page_limits(),
            registry,
        }
    }

    /// Route names of the registered resources
    pub fn resource_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn is_ready(&self) -> bool {
        !self.registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_come_from_config() {
        let mut config = GatewayConfig::default();
        config.limits.max_per_page = 50;
        let host = ServerHost::new(&config, ResourceRegistry::new());
        assert_eq!(host.limits.max_per_page, 50);
        assert_eq!(host.limits.default_per_page, 20);
    }

    #[test]
    fn test_is_ready_without_resources_returns_false() {
        let host = ServerHost::new(&GatewayConfig::default(), ResourceRegistry::new());
        assert!(!host.is_ready());
        assert!(host.resource_names().is_empty());
    }
}
