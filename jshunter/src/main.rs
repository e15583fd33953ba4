use colored::Colorize;
use jshunter::{build_options, command_argument_builder, print_summary};
use jshunter_core::{Runner, print_banner};
use tokio::sync::watch;
use tracing::{Level, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = command_argument_builder().get_matches();

    let level = if matches.get_flag("debug") { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if !matches.get_flag("quiet") {
        print_banner();
    }

    let options = match build_options(&matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(watch_interrupts(shutdown_tx));

    let summary = Runner::new(options)?.run(shutdown_rx).await?;
    print_summary(&summary);
    Ok(())
}

/// First Ctrl-C lets in-flight work finish; a second one exits at once.
async fn watch_interrupts(shutdown: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupted, finishing in-flight work. Press Ctrl-C again to exit now");
    let _ = shutdown.send(true);

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(130);
    }
}
