use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};

/// Build the local path for the segment of `camera_name` starting at `start`.
///
/// Layout: `<dest>/<camera>/<YYYY>/<MM>/<DD>/<camera> - <YYYY-MM-DD> - <HH.MM.SS><+zzzz>.mp4`.
/// Date folders and the file name use local time, or UTC when `use_utc` is set.
pub fn footage_path(
    destination: &Path,
    camera_name: &str,
    start: NaiveDateTime,
    use_utc: bool,
) -> PathBuf {
    let camera = clean_filename(camera_name);
    let stamp = file_timestamp(start, use_utc);

    destination
        .join(&camera)
        .join(stamp.format("%Y").to_string())
        .join(stamp.format("%m").to_string())
        .join(stamp.format("%d").to_string())
        .join(format!(
            "{} - {} - {}.mp4",
            camera,
            stamp.format("%Y-%m-%d"),
            stamp.format("%H.%M.%S%z")
        ))
}

/// Attach the timezone used for naming to a local wall-clock time.
fn file_timestamp(start: NaiveDateTime, use_utc: bool) -> DateTime<FixedOffset> {
    let local = start.and_local_timezone(Local).earliest();
    match (local, use_utc) {
        (Some(local), false) => local.fixed_offset(),
        (Some(local), true) => local.with_timezone(&Utc).fixed_offset(),
        // Wall-clock time skipped by a DST jump: name it as UTC.
        (None, _) => start.and_utc().fixed_offset(),
    }
}

/// Remove characters that are invalid on common filesystems:
/// `/`, `\`, `:`, `*`, `?`, `"`, `<`, `>`, `|`. Surrounding whitespace is
/// trimmed; an empty result becomes `"camera"`.
pub fn clean_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "camera".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Temporary path a segment is streamed into before being renamed.
pub fn part_path(download_path: &Path) -> PathBuf {
    let mut name = download_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    download_path.with_file_name(name)
}
