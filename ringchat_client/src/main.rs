//! RingChat client executable: a thin line-oriented shell around the
//! protocol stub. Lines read from stdin are sent as chat messages; events
//! from the service are printed as they arrive.

use std::process::ExitCode;

use clap::Parser;

use color_print::cprintln;

use ringchat::{
    logger_init, pf_error, ChatClientStub, ClientConfig, ClientEvent,
    RingChatError,
};

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::runtime::Builder;

/// Command line arguments definition.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Config parameters in TOML format string,
    /// e.g. 'discovery_port = 5010'.
    #[arg(short, long)]
    config: Option<String>,
}

async fn client_main(args: CliArgs) -> Result<(), RingChatError> {
    let config = ClientConfig::from_toml(args.config.as_deref())?;
    let mut stub = ChatClientStub::new_and_setup(config).await?;
    cprintln!("<s>waiting for a leader heartbeat...</>");

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            event = stub.next_event() => match event {
                Some(ClientEvent::LeaderFound { id, addr }) => {
                    cprintln!("<yellow>connected to leader {} at {}</>",
                              id.short(), addr);
                }
                Some(ClientEvent::Welcome { name }) => {
                    cprintln!("<green>welcome, you are {}</>", name);
                }
                Some(ClientEvent::Message { sender_name, text }) => {
                    cprintln!("<bold>{}</>: {}", sender_name, text);
                }
                Some(ClientEvent::Notice { text }) => {
                    cprintln!("<cyan>* {}</>", text);
                }
                None => break,
            },

            line = lines.next_line() => match line? {
                Some(line) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Err(e) = stub.send_message(text).await {
                        cprintln!("<red>send failed: {}</>", e);
                    }
                }
                None => break, // stdin closed
            },
        }
    }

    // best effort; there may not be a live leader to notify
    let _ = stub.leave().await;
    Ok(())
}

fn main() -> ExitCode {
    logger_init();
    let args = CliArgs::parse();

    let runtime = match Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            pf_error!("failed building runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = runtime.block_on(client_main(args)) {
        pf_error!("client exited with error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
