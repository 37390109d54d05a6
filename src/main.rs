use std::io;

use embed_text::{output, run, EmbedConfig};
use tracing_subscriber::EnvFilter;

/// Reads text on stdin, writes one JSON line on stdout.
///
/// The exit code is 0 even on failure — consumers detect errors by the shape
/// of the payload (an object with an `error` key instead of an array). That
/// matches the contract existing callers already parse; see DESIGN.md for the
/// discussion of whether a non-zero code should signal failure too.
#[tokio::main]
async fn main() {
    init_tracing();

    let mut stdout = io::stdout().lock();

    let cfg = match EmbedConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            // Config trouble honors the same output contract as everything else.
            tracing::warn!(error = %err, "invalid configuration");
            let line = output::render_error(&err.to_string());
            if let Err(err) = output::write_line(&mut stdout, &line) {
                tracing::error!(error = %err, "failed to write output");
            }
            return;
        }
    };

    let mut stdin = io::stdin().lock();
    run(&mut stdin, &mut stdout, &cfg).await;
}

/// Logs go to stderr so stdout carries nothing but the payload line.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("EMBED_TEXT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
