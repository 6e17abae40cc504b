//! Line-delimited JSON advertisement feed.
//!
//! A BLE scanner process writes one [`Advertisement`] per line to a file,
//! pipe or stdin; the feed forwards them into the proximity loop.

use super::Advertisement;
use crate::error::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of the channel between the feed and the proximity loop.
pub const FEED_CHANNEL_CAPACITY: usize = 1024;

/// Create the channel the proximity loop consumes.
#[must_use]
pub fn channel() -> (mpsc::Sender<Advertisement>, mpsc::Receiver<Advertisement>) {
    mpsc::channel(FEED_CHANNEL_CAPACITY)
}

/// Read advertisements from `reader` until EOF or until the receiver is gone.
///
/// Blank lines are skipped; malformed lines, including ones that are not
/// UTF-8, are logged and skipped. Returns the number of advertisements
/// forwarded.
///
/// # Errors
///
/// Returns an error if reading from `reader` fails.
pub async fn forward<R>(reader: R, tx: mpsc::Sender<Advertisement>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut segments = reader.split(b'\n');
    let mut forwarded = 0usize;

    while let Some(segment) = segments.next_segment().await? {
        let line = match std::str::from_utf8(&segment) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("Skipping advertisement line that is not UTF-8: {e}");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Advertisement>(line) {
            Ok(adv) => {
                if tx.send(adv).await.is_err() {
                    debug!("Proximity loop closed, stopping advertisement feed");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("Skipping malformed advertisement line: {e}"),
        }
    }

    Ok(forwarded)
}
