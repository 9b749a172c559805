use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    time::SystemTime,
};

use chrono::NaiveDate;

use crate::review::Business;

/// Reads one business identifier per line. Blank lines and `#` comments are skipped.
pub fn read_businesses(path: &Path) -> io::Result<Vec<Business>> {
    let file = File::open(path)?;
    parse_businesses(BufReader::new(file))
}

pub fn parse_businesses(reader: impl BufRead) -> io::Result<Vec<Business>> {
    let mut businesses = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        businesses.push(Business::new(line));
    }
    Ok(businesses)
}

/// `YYYY-MM-DD`, taken as midnight UTC.
pub fn parse_cutoff(s: &str) -> anyhow::Result<SystemTime> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid cutoff date {s:?}: {e}"))?;
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        anyhow::bail!("invalid cutoff date {s:?}");
    };
    Ok(midnight.and_utc().into())
}

/// `YYYY-MM-DD HH:MM` in UTC, for reports.
pub fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
