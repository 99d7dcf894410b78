//! Disk-space admission control for downloads.

use std::path::Path;

use super::error::FetchError;

/// Percentage of the filesystem in use, from total and available bytes.
pub fn used_percent(total: u64, available: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let used = total.saturating_sub(available.min(total));
    // u128 so petabyte-sized volumes can't overflow the multiplication.
    let pct = (u128::from(used) * 100).div_ceil(u128::from(total));
    pct.min(100) as u8
}

/// Refuse to download when the filesystem holding `destination` is at or
/// above `max_usage` percent used. A limit of 100 disables the check.
pub fn ensure_capacity(destination: &Path, max_usage: u8) -> Result<(), FetchError> {
    if max_usage >= 100 {
        return Ok(());
    }
    let total = fs4::total_space(destination)?;
    let available = fs4::available_space(destination)?;
    check_usage(total, available, max_usage)
}

fn check_usage(total: u64, available: u64, max_usage: u8) -> Result<(), FetchError> {
    let used = used_percent(total, available);
    if used >= max_usage {
        return Err(FetchError::DiskUsage {
            used_percent: used,
            max_usage,
        });
    }
    Ok(())
}
