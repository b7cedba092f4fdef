use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

/// One indexed file, as stored in a directory's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
    #[serde(rename = "date")]
    pub modified_at: String,
    #[serde(rename = "hash")]
    pub content_hash: String,
}

/// Renders a modification time as a fixed-width UTC string.
///
/// Every field is zero padded and the fraction always has nine digits, so
/// string order matches time order. Duplicate survivor selection relies on
/// this when it compares `modified_at` values as plain strings, so times
/// outside years 0000-9999 are rejected.
pub fn format_timestamp(time: SystemTime) -> Result<String> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
    );
    let nanos = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i128::try_from(after.as_nanos()),
        Err(before) => i128::try_from(before.duration().as_nanos()).map(|n| -n),
    }
    .context("Modification time out of range")?;
    let datetime = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .context("Modification time out of range")?;
    if datetime.year() < 0 {
        bail!("Modification time out of range: year {}", datetime.year());
    }
    datetime
        .format(format)
        .context("Failed to format modification time")
}

pub fn format_human_elapsed(elapsed: Duration) -> String {
    let elapsed_secs = elapsed.as_secs();
    let elapsed_subsec_millis = elapsed.subsec_millis();
    if elapsed_secs >= 3600 {
        let hours = elapsed_secs / 3600;
        let minutes = (elapsed_secs % 3600) / 60;
        let seconds = elapsed_secs % 60;
        format!("{hours}:{minutes:02}:{seconds:02}.{elapsed_subsec_millis:03} (h:mm:ss.mmm)")
    } else if elapsed_secs >= 60 {
        let minutes = elapsed_secs / 60;
        let seconds = elapsed_secs % 60;
        format!("{minutes}:{seconds:02}.{elapsed_subsec_millis:03} (m:ss.mmm)")
    } else {
        format!("{}.{:03} seconds", elapsed_secs, elapsed_subsec_millis)
    }
}
