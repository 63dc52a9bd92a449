//! Ballot-marking kiosk session core
//!
//! Reconciles card identity, paper-handler status and election configuration
//! into a single screen, and owns the voter session lifecycle behind it.

pub mod backend;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod screen;
pub mod session;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use backend::{Backend, MemoryStorage, Storage};
pub use config::{Config, KioskConfig, LoggingConfig};
pub use errors::{Error, Result};
pub use runtime::{KioskCommand, KioskEvent, KioskRuntime};
pub use screen::{KioskSnapshot, Screen, select};
pub use session::SessionLifecycleController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default filter
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballot_kiosk=info".into()),
        )
        .try_init()
        .map_err(|e| Error::config(format!("Failed to initialize logging: {e}")))?;

    tracing::info!("🗳️  Ballot kiosk v{} initialized", VERSION);
    Ok(())
}

/// Initialize logging from a loaded [`LoggingConfig`]
pub fn init_with_config(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ballot_kiosk={}", logging.level).into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| Error::config(format!("Failed to initialize logging: {e}")))?;

    tracing::info!("🗳️  Ballot kiosk v{} initialized", VERSION);
    Ok(())
}
