// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Default filter; stdout carries device lines, so only warnings reach stderr
pub const DEFAULT_FILTER: &str = "multicom=warn";

/// Filter used with `--verbose`
pub const VERBOSE_FILTER: &str = "multicom=debug";

/// Initialize logging system. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbose)
                .with_level(true)
                .with_file(verbose)
                .with_line_number(verbose)
        )
        .try_init()?;

    tracing::debug!("MultiCom logging system initialized");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_init_once() {
        assert!(init_logging(false).is_ok());
        // A second global subscriber is refused rather than panicking
        assert!(init_logging(true).is_err());
    }
}
