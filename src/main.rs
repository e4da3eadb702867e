use anyhow::Context;
use smallsh::Shell;
use smallsh::config::Options;
use smallsh::foreground::install_interrupt_handler;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let options: Options = argh::from_env();

    let filter = EnvFilter::try_new(options.log_filter())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    install_interrupt_handler().context("cannot install SIGINT handler")?;
    info!(pid = std::process::id(), "starting smallsh");

    Shell::new(&options).repl()
}
