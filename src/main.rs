use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wisp::{
    app,
    cli::{
        handle_health_command, handle_history_command, handle_list_command, handle_logs_command,
        handle_status_command, handle_stop_command, Cli, CliCommand,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("wisp {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Status(args)) => {
            handle_status_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::List) => {
            handle_list_command().await?;
            return Ok(());
        }
        Some(CliCommand::Stop(args)) => {
            handle_stop_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Health) => {
            handle_health_command().await?;
            return Ok(());
        }
        Some(CliCommand::History(args)) => {
            handle_history_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Logs(args)) => {
            handle_logs_command(args).await?;
            return Ok(());
        }
        None => {}
    }

    app::run_service().await
}
