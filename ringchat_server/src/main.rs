//! RingChat server node executable.

use std::process::ExitCode;

use clap::Parser;

use ringchat::{logger_init, pf_error, ChatNode, RingChatError, ServerConfig};

use tokio::runtime::Builder;
use tokio::sync::watch;

/// Command line arguments definition.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Service port for client and election token traffic, unique per
    /// server process on a host.
    #[arg(short, long)]
    port: u16,

    /// Config parameters in TOML format string,
    /// e.g. 'hb_timeout_ms = 20000'.
    #[arg(short, long)]
    config: Option<String>,
}

fn server_main(args: CliArgs) -> Result<(), RingChatError> {
    // ctrl-c flips the shutdown signal, letting the node exit cleanly
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .map_err(|e| {
        RingChatError::msg(format!("failed setting ctrl-c handler: {}", e))
    })?;

    let config = ServerConfig::from_toml(args.config.as_deref())?;

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let mut node = ChatNode::new_and_setup(args.port, config).await?;
        node.run(shutdown_rx).await
    })
}

fn main() -> ExitCode {
    logger_init();
    let args = CliArgs::parse();

    if let Err(e) = server_main(args) {
        pf_error!("server exited with error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
