//! ServerBuilder for fluent API to build HTTP servers

use super::handlers::AppState;
use super::host::ServerHost;
use super::registry::ResourceRegistry;
use super::router::build_router;
use crate::config::GatewayConfig;
use crate::core::resource::ResourceSchema;
use crate::core::service::{EntityQueryService, ResourceFetcher};
use crate::resources::{JobRole, Product, Resource, WorkOrder};
use crate::upstream::{HttpQueryExecutor, QueryExecutor};
use anyhow::Result;
use axum::Router;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builds the query service of one resource once the executor is known
type ServiceFactory =
    fn(Arc<ResourceSchema>, Arc<dyn QueryExecutor>, usize) -> Arc<dyn ResourceFetcher>;

fn service<T>(
    schema: Arc<ResourceSchema>,
    executor: Arc<dyn QueryExecutor>,
    max_fetch_rows: usize,
) -> Arc<dyn ResourceFetcher>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    Arc::new(EntityQueryService::<T>::new(schema, executor, max_fetch_rows))
}

/// Builder for the gateway's HTTP server
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(GatewayConfig::load()?)
///     .with_builtin_resources()
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: GatewayConfig,
    executor: Option<Arc<dyn QueryExecutor>>,
    resources: Vec<(ResourceSchema, ServiceFactory)>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            executor: None,
            resources: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Use `config` for limits and configuration-declared resources
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the executor every resource queries through.
    ///
    /// Without one, an HTTP executor is built from the upstream section of
    /// the configuration.
    pub fn with_executor(mut self, executor: impl QueryExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Register a typed resource
    pub fn register<T: Resource>(self) -> Self {
        self.register_schema::<T>(T::schema())
    }

    /// Register `schema` with records of type `T`
    pub fn register_schema<T>(mut self, schema: ResourceSchema) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.resources.push((schema, service::<T>));
        self
    }

    /// Register work orders, job roles and products
    pub fn with_builtin_resources(self) -> Self {
        self.register::<WorkOrder>()
            .register::<JobRole>()
            .register::<Product>()
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Validate everything and build the shared host.
    ///
    /// Resources declared in the configuration are registered after the
    /// typed ones and served as JSON records.
    pub fn build_host(self) -> Result<ServerHost> {
        self.config.validate_limits()?;

        let executor: Arc<dyn QueryExecutor> = match self.executor {
            Some(executor) => executor,
            None => {
                self.config.validate()?;
                Arc::new(HttpQueryExecutor::new(&self.config.upstream)?)
            }
        };

        let max_fetch_rows = self.config.limits.max_fetch_rows;
        let declared = self
            .config
            .resources
            .iter()
            .cloned()
            .map(|schema| (schema, service::<Value> as ServiceFactory));

        let mut registry = ResourceRegistry::new();
        for (schema, factory) in self.resources.into_iter().chain(declared) {
            schema.validate()?;
            tracing::debug!(resource = %schema.name, table = %schema.table_name, "registering resource");
            registry.register(factory(Arc::new(schema), executor.clone(), max_fetch_rows))?;
        }

        Ok(ServerHost::new(&self.config, registry))
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host: AppState = Arc::new(self.build_host()?);

        let mut app = build_router(host);
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }
        Ok(app)
    }

    /// Serve on the configured bind address until SIGTERM or Ctrl+C
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.bind_addr;
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
