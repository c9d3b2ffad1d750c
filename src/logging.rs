// ABOUTME: Tracing subscriber setup for the command-line front end
// ABOUTME: RUST_LOG wins when set; otherwise info, or debug with --verbose

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Output goes to stderr so stdout stays
/// clean for JSON results. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "blup_client=debug,info"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("debug"));
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }

    #[test]
    fn test_init_twice() {
        init(false);
        init(true);
    }
}
