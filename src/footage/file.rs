use std::path::Path;

use futures_util::StreamExt;
use reqwest::Response;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::FetchError;
use super::paths::part_path;

/// Result of streaming one export response to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentWrite {
    /// File written and moved into place.
    Saved { bytes: u64 },
    /// Server had no footage for the segment; nothing was kept.
    Empty,
}

/// Stream an export `response` into `<download_path>.part`, then rename it
/// to `download_path`.
///
/// Any stale `.part` file is replaced. An empty body leaves no file behind.
pub async fn write_segment(
    response: Response,
    download_path: &Path,
    segment: &str,
) -> Result<SegmentWrite, FetchError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(FetchError::Unauthorized(segment.to_string()));
    }
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            segment: segment.to_string(),
        });
    }

    if let Some(parent) = download_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let part = part_path(download_path);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&part)
        .await?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&part).await;
                return Err(FetchError::Http {
                    source: e,
                    segment: segment.to_string(),
                    bytes_written,
                });
            }
        };
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if bytes_written == 0 {
        let _ = fs::remove_file(&part).await;
        return Ok(SegmentWrite::Empty);
    }

    fs::rename(&part, download_path).await?;
    Ok(SegmentWrite::Saved {
        bytes: bytes_written,
    })
}
