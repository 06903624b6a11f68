//! Diagnostics go to stderr so command output on stdout stays clean.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `RUST_LOG` wins when set. Otherwise `--verbose` turns on debug output for
/// this crate and everything else stays silent.
fn build_filter(verbose: bool, env_directives: Option<&str>) -> EnvFilter {
    if let Some(filter) = env_directives.and_then(|d| EnvFilter::try_new(d).ok()) {
        return filter;
    }
    if verbose {
        EnvFilter::new(format!("{CRATE_TARGET}=debug"))
    } else {
        EnvFilter::new("off")
    }
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(verbose, env_directives.as_deref());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .without_time(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_by_default() {
        assert_eq!(build_filter(false, None).to_string(), "off");
    }

    #[test]
    fn test_verbose_enables_crate_debug() {
        assert_eq!(build_filter(true, None).to_string(), "xrate=debug");
    }

    #[test]
    fn test_env_directives_take_precedence() {
        assert_eq!(build_filter(true, Some("warn")).to_string(), "warn");
        // Unparseable directives fall back to the flag
        assert_eq!(build_filter(false, Some("xrate=loud")).to_string(), "off");
    }
}
