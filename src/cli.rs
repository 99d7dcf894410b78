use clap::{Args, Parser, Subcommand};

use crate::types::{CameraSelection, LogLevel};

/// Longest accepted `--bucket-hours`: one leap year.
pub const MAX_BUCKET_HOURS: u32 = 366 * 24;

#[derive(Parser, Debug)]
#[command(
    name = "protect-archiver-rs",
    version,
    about = "Archive UniFi Protect footage to local storage"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download all footage not yet synchronized, resuming from the statefile
    Sync(SyncArgs),
    /// Print the recorded progress of every camera
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory footage is stored in
    pub dest: String,

    /// Address of the Protect server or UniFi OS console
    #[arg(long, env = "PROTECT_ADDRESS", default_value = "unifi")]
    pub address: String,

    /// HTTPS port of the server
    #[arg(long, env = "PROTECT_PORT", default_value_t = 443)]
    pub port: u16,

    /// The server is a standalone Protect install, not a UniFi OS console
    #[arg(long, env = "PROTECT_NOT_UNIFI_OS")]
    pub not_unifi_os: bool,

    /// Local user name on the server
    #[arg(long, env = "PROTECT_USERNAME")]
    pub username: String,

    /// Password (prompted for when absent).
    /// WARNING: passing via --password is visible in process listings.
    /// Prefer the PROTECT_PASSWORD environment variable instead.
    #[arg(long, env = "PROTECT_PASSWORD")]
    pub password: Option<String>,

    /// Verify the server's TLS certificate
    #[arg(long, env = "PROTECT_VERIFY_SSL")]
    pub verify_ssl: bool,

    /// Cameras to synchronize: "all" or a comma-separated list of ids
    #[arg(long, env = "PROTECT_CAMERAS", default_value = "all")]
    pub cameras: CameraSelection,

    /// Seconds to wait after each downloaded file
    #[arg(long, env = "PROTECT_WAIT_BETWEEN_DOWNLOADS", default_value_t = 0)]
    pub wait_between_downloads: u64,

    /// Skip files that fail to download instead of failing the whole bucket
    #[arg(long, env = "PROTECT_IGNORE_FAILED_DOWNLOADS")]
    pub ignore_failed_downloads: bool,

    /// Do not download files that already exist on disk
    #[arg(long, env = "PROTECT_SKIP_EXISTING_FILES")]
    pub skip_existing_files: bool,

    /// Name files and date folders in UTC instead of local time
    #[arg(long, env = "PROTECT_USE_UTC_FILENAMES")]
    pub use_utc_filenames: bool,

    /// Stop downloading once the destination disk is this percent full (100 disables)
    #[arg(long, env = "PROTECT_MAX_USAGE", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    pub max_usage: u8,

    /// Statefile path, relative to the destination unless absolute
    #[arg(long, env = "PROTECT_STATEFILE", default_value = "sync.state")]
    pub statefile: String,

    /// Ignore recorded progress and start from the recording start
    #[arg(long, env = "PROTECT_IGNORE_STATE")]
    pub ignore_state: bool,

    /// Sync from this time instead of the recorded progress (e.g. 2024-01-02 or 2024-01-02T14:00:00)
    #[arg(long, env = "PROTECT_START")]
    pub start: Option<String>,

    /// Sync up to this time instead of now
    #[arg(long, env = "PROTECT_END")]
    pub end: Option<String>,

    /// Length of a sync bucket in hours (at most a leap year); progress is recorded per bucket
    #[arg(long, default_value_t = 24,
          value_parser = clap::value_parser!(u32).range(1..=MAX_BUCKET_HOURS as i64))]
    pub bucket_hours: u32,

    /// Max retries per file download (0 = no retries)
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Initial retry delay in seconds
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Directory footage is stored in
    pub dest: String,

    /// Statefile path, relative to the destination unless absolute
    #[arg(long, env = "PROTECT_STATEFILE", default_value = "sync.state")]
    pub statefile: String,
}
