//! Tracing setup for stdio servers

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber for a server crate
///
/// Output goes to stderr. `RUST_LOG` is honoured on top of a default of
/// `<crate_name>=info`, and `LOG_FORMAT=json` switches to JSON lines.
///
/// ```rust,ignore
/// mcp_common::init_tracing("nl2sql_mcp")?;
/// ```
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = default_directive(crate_name).parse()?;
    let filter = EnvFilter::from_default_env().add_directive(directive);
    let registry = tracing_subscriber::registry().with(filter);

    if json_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

fn default_directive(crate_name: &str) -> String {
    format!("{}=info", crate_name)
}

fn json_requested(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|v| v.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_selection() {
        assert!(json_requested(Some("JSON")));
        assert!(json_requested(Some("json")));
        assert!(!json_requested(Some("text")));
        assert!(!json_requested(None));
    }

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("nl2sql_mcp");
        assert_eq!(directive, "nl2sql_mcp=info");
        assert!(directive
            .parse::<tracing_subscriber::filter::Directive>()
            .is_ok());
    }
}
