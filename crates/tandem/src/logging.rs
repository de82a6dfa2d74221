use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "tandem=debug,tandem_core=debug,tandem_realtime=debug";

/// Prints the logs of the run loop and the realtime sessions to stdout.
///
/// `RUST_LOG` takes precedence over the default verbose filter. Does
/// nothing when a global subscriber is already installed.
pub fn enable_verbose_stdout_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .try_init();
    if installed.is_err() {
        debug!("a global subscriber is already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_twice() {
        enable_verbose_stdout_logging();
        enable_verbose_stdout_logging();
    }
}
