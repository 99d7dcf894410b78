use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::cli::SyncArgs;
use crate::footage::FetchConfig;
use crate::interval::Partitioner;
use crate::protect::ClientConfig;
use crate::retry::RetryPolicy;
use crate::sync::SyncConfig;
use crate::types::CameraSelection;

/// Settings of a `sync` invocation, validated.
pub struct Config {
    pub destination: PathBuf,
    pub statefile: PathBuf,
    pub address: String,
    pub username: String,
    pub password: Option<String>,
    pub cameras: CameraSelection,

    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,

    pub wait_between_downloads: u64,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub bucket_hours: u32,
    pub port: u16,
    pub max_usage: u8,

    pub not_unifi_os: bool,
    pub verify_ssl: bool,
    pub ignore_failed_downloads: bool,
    pub skip_existing_files: bool,
    pub use_utc_filenames: bool,
    pub ignore_state: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("destination", &self.destination)
            .field("statefile", &self.statefile)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cameras", &self.cameras)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("ignore_state", &self.ignore_state)
            .finish_non_exhaustive()
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(args: SyncArgs) -> anyhow::Result<Self> {
        let start = args.start.as_deref().map(parse_range_bound).transpose()?;
        let end = args.end.as_deref().map(parse_range_bound).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                anyhow::bail!("--start ({}) must be before --end ({})", start, end);
            }
        }

        Ok(Self {
            destination: expand_tilde(&args.dest),
            statefile: expand_tilde(&args.statefile),
            address: args.address,
            username: args.username,
            password: args.password,
            cameras: args.cameras,
            start,
            end,
            wait_between_downloads: args.wait_between_downloads,
            retry_delay_secs: args.retry_delay,
            timeout_secs: args.timeout,
            max_retries: args.max_retries,
            bucket_hours: args.bucket_hours,
            port: args.port,
            max_usage: args.max_usage,
            not_unifi_os: args.not_unifi_os,
            verify_ssl: args.verify_ssl,
            ignore_failed_downloads: args.ignore_failed_downloads,
            skip_existing_files: args.skip_existing_files,
            use_utc_filenames: args.use_utc_filenames,
            ignore_state: args.ignore_state,
            no_progress_bar: args.no_progress_bar,
        })
    }

    pub fn client_config(&self, password: String) -> ClientConfig {
        ClientConfig {
            address: self.address.clone(),
            port: self.port,
            username: self.username.clone(),
            password,
            not_unifi_os: self.not_unifi_os,
            verify_ssl: self.verify_ssl,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Fetcher settings; `destination` is the validated download directory.
    pub fn fetch_config(&self, destination: &Path) -> FetchConfig {
        FetchConfig {
            destination: destination.to_path_buf(),
            use_utc_filenames: self.use_utc_filenames,
            skip_existing_files: self.skip_existing_files,
            ignore_failed_downloads: self.ignore_failed_downloads,
            max_usage: self.max_usage,
            wait_between_downloads: Duration::from_secs(self.wait_between_downloads),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay_secs: self.retry_delay_secs,
                max_delay_secs: RetryPolicy::default().max_delay_secs,
            },
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            ignore_state: self.ignore_state,
            start: self.start,
            end: self.end,
            partitioner: Partitioner::with_bucket_hours(self.bucket_hours),
            show_progress: !self.no_progress_bar,
        }
    }
}

/// Parse `--start`/`--end` into local wall-clock time.
///
/// Accepts `2024-01-02`, `2024-01-02T14:30:00`, `2024-01-02 14:30:00` and
/// `2024-01-02 14:30:00+0100`; the last is converted to local time.
pub(crate) fn parse_range_bound(s: &str) -> anyhow::Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    anyhow::bail!(
        "Cannot parse '{}' as a date. Expected 2024-01-02, 2024-01-02T14:30:00, \
         2024-01-02 14:30:00 or 2024-01-02 14:30:00+0100",
        s
    )
}
