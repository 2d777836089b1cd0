//
// main.rs
// voxread
//
// Binary entry point: logging setup and CLI dispatch.
//

use tracing_subscriber::EnvFilter;

use voxread::cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    cli::run()
}
