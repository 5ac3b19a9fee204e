use clap::{Parser, Subcommand};
use linux_assistant::app::App;
use linux_assistant::config::Settings;
use linux_assistant::constants::policy::{DEFAULT_MAX_RUNTIME_SEC, DEFAULT_TARGET_DEVICE};
use linux_assistant::services::logger::Logger;
use linux_assistant::services::validation::CommandPolicy;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "linux-assistant", version, about = "Validated remote command execution over SSH")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Address to bind, overrides LISTEN_ADDR
        #[arg(long)]
        listen: Option<String>,
    },
    /// Check a command against the safety policy without running it
    Check {
        command: String,
        #[arg(long, env = "TARGET_DEVICE", default_value = DEFAULT_TARGET_DEVICE)]
        device: String,
        #[arg(long, env = "MAX_RUNTIME_SEC", default_value_t = DEFAULT_MAX_RUNTIME_SEC)]
        max_runtime: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Check {
            command,
            device,
            max_runtime,
        } => {
            let verdict = CommandPolicy::new(device, max_runtime).validate(&command);
            println!(
                "{}",
                serde_json::to_string_pretty(&verdict).unwrap_or_default()
            );
            std::process::exit(if verdict.allowed { 0 } else { 2 });
        }
        Command::Serve { listen } => {
            let logger = Logger::new("linux-assistant");
            let settings = match Settings::from_env() {
                Ok(settings) => settings,
                Err(err) => {
                    eprintln!("linux-assistant: {}", err);
                    std::process::exit(1);
                }
            };
            let listen_addr = listen.unwrap_or_else(|| settings.listen_addr.clone());
            let app = Arc::new(App::initialize(logger, settings));
            if let Err(err) = linux_assistant::http::serve(app, &listen_addr).await {
                eprintln!("linux-assistant: {}", err);
                std::process::exit(1);
            }
        }
    }
}
