//! Logging setup for binaries and tests that embed the core.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::GeneralConfig;

/// Install a `tracing` subscriber.
///
/// `RUST_LOG` wins over `general.log_level`. With `general.json_logs` the
/// output is one JSON object per line. Returns `false` if a global
/// subscriber was already installed, so calling this twice is harmless.
pub fn init_tracing(general: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if general.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).compact())
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let general = GeneralConfig::default();
        let _ = init_tracing(&general);
        assert!(!init_tracing(&general));
    }
}
