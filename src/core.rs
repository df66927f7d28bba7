use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::{
    app::AppContext,
    config::Config,
    health,
    http::{CronModule, PostsModule, RouteModule, SubscriptionModule, identity_layer},
    request_id::MakeRequestUuid,
    scheduling::{PostScheduler, SchedulerHandle},
};

type BoxedModule = Box<dyn RouteModule + Send + Sync>;

/// The castway server: API routes, middleware and the post scheduler.
pub struct App {
    config: Config,
    context: AppContext,
    modules: Vec<BoxedModule>,
}

impl App {
    /// Creates a new App with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a new App with the built-in API modules registered
    pub fn with_config(config: Config) -> Self {
        let context = AppContext {
            config: Arc::new(config.clone()),
            ..AppContext::new()
        };
        let modules: Vec<BoxedModule> = vec![
            Box::new(SubscriptionModule),
            Box::new(PostsModule),
            Box::new(CronModule),
        ];
        Self {
            config,
            context,
            modules,
        }
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Set the application context. Its config is replaced with the App's.
    pub fn with_context(mut self, mut context: AppContext) -> Self {
        context.config = Arc::new(self.config.clone());
        self.context = context;
        self
    }

    /// Register an additional route module
    pub fn register_module<M: RouteModule + Send + Sync + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Build the fully layered router.
    ///
    /// Layer order, outermost first: trace, request id, identity, then each
    /// module's own route layers (the subscription gate).
    pub fn into_router(self) -> Router {
        let ctx = self.context;

        let mut router = Router::<AppContext>::new().route("/health", get(health::health_handler));
        for module in &self.modules {
            router = module.register(router, &ctx);
        }

        router
            .layer(from_fn_with_state(ctx.clone(), identity_layer))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .with_state(ctx)
    }

    fn start_scheduler(&self) -> Option<SchedulerHandle> {
        if !self.config.scheduler.enabled {
            return None;
        }
        match (&self.context.posts, &self.context.publisher) {
            (Some(posts), Some(publisher)) => {
                let scheduler = PostScheduler::new(
                    posts.clone(),
                    publisher.clone(),
                    self.config.scheduler.poll_interval(),
                );
                Some(scheduler.spawn())
            }
            _ => {
                tracing::warn!("Scheduler enabled but post store or publisher missing; not starting");
                None
            }
        }
    }

    /// Bind the configured address and serve until Ctrl+C or SIGTERM
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an existing listener until `signal` resolves.
    ///
    /// The post scheduler (when enabled) is stopped after the server has
    /// drained.
    pub async fn serve_with_shutdown<F>(
        self,
        listener: TcpListener,
        signal: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let scheduler = self.start_scheduler();
        let router = self.into_router();

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Health check available at http://{}/health", addr);

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await;

        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
        result
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for App with fluent API
#[must_use = "builder does nothing until you call build()"]
pub struct AppBuilder {
    config: Config,
    context: AppContext,
    modules: Vec<BoxedModule>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            context: AppContext::new(),
            modules: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_context(mut self, context: AppContext) -> Self {
        self.context = context;
        self
    }

    pub fn register_module<M: RouteModule + Send + Sync + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn build(self) -> App {
        let mut app = App::with_config(self.config).with_context(self.context);
        app.modules.extend(self.modules);
        app
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Grace period for in-flight connections
    tokio::time::sleep(Duration::from_secs(1)).await;
}
