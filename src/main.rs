mod cli;
mod config;
mod error;
mod pipeline;
mod protocol;
mod screen;
mod transport;

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{FileConfig, StreamConfig};
use screen::capture::{CaptureSource, ScrapSource};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config_path = expand_path(&cli.config);
    let file_config = FileConfig::load(&config_path);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&file_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Stream {
            key,
            max_bytes,
            display,
            username,
        } => {
            let stream = stream_config(&file_config, key, max_bytes, display, username)?;
            start_stream(file_config, stream).await?;
        }
        Commands::Displays => list_displays()?,
        Commands::GenConfig => println!("{}", FileConfig::default().to_toml()?),
    }

    Ok(())
}

/// Fill in anything the command line left out: config file first, then an
/// interactive prompt for the values that have no sensible default.
fn stream_config(
    file: &FileConfig,
    key: Option<String>,
    max_bytes: Option<u64>,
    display: Option<usize>,
    username: Option<String>,
) -> Result<StreamConfig> {
    let needs_prompt = key.is_none() || (username.is_none() && file.stream.user_name.is_empty());
    if needs_prompt {
        println!("Please input the following information correctly...");
    }

    let session_key = match key {
        Some(k) => k,
        None => prompt("Enter ScreenKey: ")?,
    };
    let user_name = match username {
        Some(u) => u,
        None if !file.stream.user_name.is_empty() => file.stream.user_name.clone(),
        None => prompt("Enter your Roblox username: ")?,
    };

    let stream = StreamConfig {
        session_key: session_key.trim().to_string(),
        envelope_byte_budget: max_bytes.unwrap_or(file.stream.max_json_bytes),
        display_index: display.unwrap_or(file.stream.display_index),
        host_name: config::local_host_name(),
        user_name: user_name.trim().to_string(),
    };
    stream.validate()?;
    Ok(stream)
}

async fn start_stream(file: FileConfig, stream: StreamConfig) -> Result<()> {
    let budget = stream.budget();
    println!("🖥️  Streaming display {} as {}@{}", stream.display_index, stream.user_name, stream.host_name);
    println!(
        "📐 Budget: {} JSON bytes → {} raw bytes → {} pixels",
        stream.envelope_byte_budget, budget.max_raw_bytes, budget.max_pixels
    );
    println!("🔌 Endpoint: {}", file.endpoint.base_url);

    let transport = HttpTransport::new()?;
    let pipeline = pipeline::Pipeline::new(ScrapSource::new(), transport, stream, &file.endpoint, file.timing)?;

    let stats = pipeline
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Screen stream stopped")?;

    println!(
        "✅ Stopped. {} frames sent, {} dropped.",
        stats.frames_sent, stats.frames_dropped
    );
    Ok(())
}

fn list_displays() -> Result<()> {
    let displays = ScrapSource::new()
        .list_displays()
        .context("Failed to enumerate displays")?;

    println!("🖥️  {} display(s) available:", displays.len());
    for d in displays {
        println!("  {}: {}x{}", d.index, d.width, d.height);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut buf = PathBuf::from(home);
            buf.push(stripped);
            return buf;
        }
    }
    PathBuf::from(path)
}
