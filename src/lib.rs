//! castway - subscription-gated podcast studio backend and client core
//!
//! castway decides, from a signed-in user's billing record, whether the
//! studio's paid features are available, keeps that decision in sync as the
//! user or their subscription changes, and redirects lapsed users to the
//! billing page with a short notification. The same evaluation gates the
//! HTTP API.
//!
//! # Modules
//!
//! - [`billing`]: subscription records, storage and the fail-closed evaluator
//! - [`access`]: client sync layer and the access guard
//! - [`notify`]: transient notifications (toasts)
//! - [`scheduling`]: scheduled social posts for subscribers
//! - [`http`]: identity middleware, subscription gate and API routes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use castway::{App, AppContext, ConfigBuilder};
//! use std::sync::Arc;
//!
//! # async fn run(store: Arc<dyn castway::billing::SubscriptionStore>) -> anyhow::Result<()> {
//! let config = ConfigBuilder::new().from_env().build()?;
//! castway::init_tracing_with_config(&config);
//!
//! let context = AppContext::builder().with_subscriptions(store).build();
//! App::with_config(config).with_context(context).serve().await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
mod app;
pub mod billing;
mod config;
mod core;
mod error;
pub mod health;
pub mod http;
pub mod notify;
mod request_id;
pub mod scheduling;
pub mod testing;
mod utils;

pub use app::{AppContext, AppContextBuilder};
pub use config::{
    AccessConfig, Config, ConfigBuilder, LoggingConfig, SchedulerConfig, ServerConfig,
};
pub use core::{App, AppBuilder};
pub use error::{CastwayError, ErrorResponse, Result};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use http::{CurrentIdentity, RouteModule, identity_layer, require_subscription};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "castway=debug")
/// - `CASTWAY_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::parse_env_with_prefix::<bool>("LOG_JSON").unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing from a [`Config`]
pub fn init_tracing_with_config(config: &Config) {
    install(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);
    // try_init: a subscriber may already be installed (tests, embedding apps)
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
