use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, warn};

use tcpdumpw::{Cli, Lifecycle, deployment_tags};
use tcpw_core::CaptureBackend;
use tcpw_discover::HostInterfaces;
use tcpw_exec::TcpdumpBackend;
use tcpw_observe::{Identity, Journal, logger_init};

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let cfg = cli
        .logger_config()
        .with_context(|| format!("invalid log format '{}'", cli.log_format))?;
    logger_init(&cfg).context("failed to install diagnostic logger")?;
    Ok(())
}

async fn shutdown_signal() -> String {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => "interrupt".to_string(),
                    _ = term.recv() => "terminated".to_string(),
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable; listening for interrupt only");
                let _ = tokio::signal::ctrl_c().await;
                "interrupt".to_string()
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "interrupt".to_string()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("{e:#}");
    }

    let journal = Journal::stdout(Identity::from_env());
    let cfg = cli.run_config(deployment_tags());

    let lifecycle = Lifecycle::new(
        cfg,
        journal,
        Arc::new(HostInterfaces),
        Box::new(|location| Arc::new(TcpdumpBackend::new(location)) as Arc<dyn CaptureBackend>),
    );

    let code = match lifecycle.run(shutdown_signal()).await {
        Ok(()) => 0,
        Err(e) => {
            debug!(error = %e, "startup failed");
            e.exit_code()
        }
    };
    std::process::exit(code);
}
