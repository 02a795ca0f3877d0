use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::error::{PrepError, Result};

// env_filter = trace|debug|info|warn|error|off, RUST_LOG takes precedence
pub fn get_subscriber(env_filter: &str) -> impl Subscriber + Send + Sync {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter)))
        .with(fmt::layer().with_target(false))
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync + 'static) -> Result<()> {
    set_global_default(subscriber)
        .map_err(|e| PrepError::Config(format!("cannot install log subscriber: {}", e)))
}
