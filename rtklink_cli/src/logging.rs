use std::{fs::File, io::stderr, path::Path};

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_ENV: &str = "RTKLINK_LOGLEVEL";

/// `RUST_LOG` wins over `RTKLINK_LOGLEVEL`; both take `EnvFilter` directives.
fn filter() -> EnvFilter {
    let directives = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| format!("rtklink=info,{}=info", env!("CARGO_CRATE_NAME")));
    EnvFilter::new(directives)
}

pub fn initialize(log_file: Option<&Path>) -> Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(filter());

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let file_subscriber = tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_writer(file)
                .with_target(false)
                .with_ansi(false)
                .with_filter(filter());
            tracing_subscriber::registry()
                .with(console)
                .with(file_subscriber)
                .init();
            info!("Full log available in: {}", path.display());
        },
        None => tracing_subscriber::registry().with(console).init(),
    }
    Ok(())
}
