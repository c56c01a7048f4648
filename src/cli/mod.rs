use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "screencast")]
#[command(about = "🖥️ Stream a display as raw RGBA frames over HTTP", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, global = true, default_value = "screencast.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a display and stream it until Ctrl+C or a failure
    Stream {
        /// Screen key identifying the session on the server (prompted if omitted)
        #[arg(short, long)]
        key: Option<String>,

        /// Maximum size of one serialized frame in bytes (ex: 300000)
        #[arg(short = 'b', long)]
        max_bytes: Option<u64>,

        /// Display number to capture, starting at 1
        #[arg(short, long)]
        display: Option<usize>,

        /// Roblox username sent with every frame (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// List the displays that can be captured
    Displays,

    /// Print the default configuration as TOML
    GenConfig,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
