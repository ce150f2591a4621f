use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::recorder::CallType;

pub mod client;

use client::ControlClient;

#[derive(Parser, Debug)]
#[command(name = "wisp")]
#[command(about = "Ghost-participant call recording service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Show the recording status of one call
    Status(StatusCliArgs),
    /// List active recording sessions
    List,
    /// Stop the recording for one call
    Stop(StopCliArgs),
    /// Show service health and capacity
    Health,
    /// View completed recordings
    History(HistoryCliArgs),
    /// View application logs
    Logs(LogsCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct StatusCliArgs {
    /// Call type (audio or video)
    pub call_type: String,
    /// Call identifier
    pub call_id: String,
}

#[derive(ClapArgs, Debug)]
pub struct StopCliArgs {
    /// Call type (audio or video)
    pub call_type: String,
    /// Call identifier
    pub call_id: String,
}

#[derive(ClapArgs, Debug)]
pub struct HistoryCliArgs {
    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(ClapArgs, Debug)]
pub struct LogsCliArgs {
    /// Number of log lines to fetch
    #[arg(short, long, default_value = "100")]
    pub lines: usize,
}

fn parse_call_type(raw: &str) -> Result<CallType> {
    raw.parse::<CallType>().map_err(|e| anyhow!(e))
}

pub async fn handle_status_command(args: StatusCliArgs) -> Result<()> {
    let call_type = parse_call_type(&args.call_type)?;
    let client = ControlClient::from_config()?;

    let status = client
        .get(&format!("/recording/status/{}/{}", call_type, args.call_id))
        .await?;

    if status["isRecording"].as_bool().unwrap_or(false) {
        println!(
            "Recording ({}) — session {}, running {}s",
            status["status"].as_str().unwrap_or("unknown"),
            status["sessionId"].as_str().unwrap_or("?"),
            status["duration"].as_u64().unwrap_or(0),
        );
    } else {
        println!("Not recording");
    }

    Ok(())
}

pub async fn handle_list_command() -> Result<()> {
    let client = ControlClient::from_config()?;
    let list = client.get("/recording/list").await?;

    let recordings = list["recordings"].as_array().cloned().unwrap_or_default();
    if recordings.is_empty() {
        println!("No active recording sessions.");
        return Ok(());
    }

    println!("{} active recording session(s):\n", recordings.len());
    for recording in recordings {
        println!(
            "{}/{}  {}  session {}  {}s",
            recording["callType"].as_str().unwrap_or("?"),
            recording["callId"].as_str().unwrap_or("?"),
            recording["status"].as_str().unwrap_or("?"),
            recording["sessionId"].as_str().unwrap_or("?"),
            recording["durationSeconds"].as_u64().unwrap_or(0),
        );
    }

    Ok(())
}

pub async fn handle_stop_command(args: StopCliArgs) -> Result<()> {
    let call_type = parse_call_type(&args.call_type)?;
    let client = ControlClient::from_config()?;

    let summary = client
        .post(
            "/recording/stop",
            serde_json::json!({
                "callId": args.call_id,
                "callType": call_type.as_str(),
            }),
        )
        .await?;

    println!(
        "Stopped after {}s",
        summary["duration"].as_u64().unwrap_or(0)
    );
    if let Some(file_url) = summary["fileUrl"].as_str() {
        println!("Recording: {}", file_url);
    }

    Ok(())
}

pub async fn handle_health_command() -> Result<()> {
    let client = ControlClient::from_config()?;
    let health = client.get("/health").await?;

    println!(
        "Status: {} — {}/{} slots in use, {} waiting in queue",
        health["status"].as_str().unwrap_or("unknown"),
        health["activeRecordings"].as_u64().unwrap_or(0),
        health["capacity"].as_u64().unwrap_or(0),
        health["queueDepth"].as_u64().unwrap_or(0),
    );

    Ok(())
}

pub async fn handle_history_command(args: HistoryCliArgs) -> Result<()> {
    let client = ControlClient::from_config()?;
    let history = client
        .get(&format!("/recording/history?limit={}", args.limit))
        .await?;

    let records = history["recordings"].as_array().cloned().unwrap_or_default();
    if records.is_empty() {
        println!("No completed recordings.");
        return Ok(());
    }

    println!("Found {} recording(s):\n", records.len());
    for record in records {
        println!("ID: {}", record["id"].as_i64().unwrap_or(0));
        println!(
            "Call: {}/{}",
            record["callType"].as_str().unwrap_or("?"),
            record["callId"].as_str().unwrap_or("?"),
        );
        println!(
            "Duration: {}s",
            record["durationSeconds"].as_i64().unwrap_or(0)
        );
        if let Some(file_url) = record["fileUrl"].as_str() {
            println!("File: {}", file_url);
        }
        println!("Stopped: {}", record["stoppedAt"].as_str().unwrap_or("?"));
        println!("---");
    }

    Ok(())
}

pub async fn handle_logs_command(args: LogsCliArgs) -> Result<()> {
    let client = ControlClient::from_config()?;
    let logs = client.get(&format!("/logs?lines={}", args.lines)).await?;

    let lines = logs["appLogs"].as_array().cloned().unwrap_or_default();
    if lines.is_empty() {
        println!("No application logs available.");
    }
    for line in lines {
        if let Some(text) = line.as_str() {
            println!("{}", text);
        }
    }

    Ok(())
}
