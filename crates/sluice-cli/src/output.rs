//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use clap::ValueEnum;
use sluice_core::{ServerState, SidebarCounts, Torrent};

use crate::client::{CliError, CliResult};

/// Output format for commands that render structured data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub(crate) fn render_view(torrents: &[Torrent], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(torrents)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => print!("{}", view_table(torrents)),
    }
    Ok(())
}

pub(crate) fn render_counts(counts: &SidebarCounts) {
    print!("{}", counts_summary(counts));
}

pub(crate) fn render_status_line(
    version: u64,
    shown: usize,
    server: Option<&ServerState>,
    peak_download: Option<u64>,
) {
    println!("{}", status_line(version, shown, server, peak_download));
}

pub(crate) fn view_table(torrents: &[Torrent]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<18} {:>6} {:>11} {:>11} {:>9} {:<12} NAME",
        "HASH", "STATE", "PROG", "DOWN", "UP", "ETA", "CATEGORY"
    );
    for torrent in torrents {
        let _ = writeln!(
            out,
            "{:<8} {:<18} {:>6} {:>11} {:>11} {:>9} {:<12} {}",
            short_hash(&torrent.hash),
            torrent.state.as_str(),
            format_progress(torrent.progress),
            format_rate(torrent.download_bps),
            format_rate(torrent.upload_bps),
            format_eta(torrent.eta_secs),
            if torrent.category.is_empty() {
                "-"
            } else {
                torrent.category.as_str()
            },
            torrent.name
        );
    }
    out
}

pub(crate) fn counts_summary(counts: &SidebarCounts) -> String {
    let mut out = String::new();
    let statuses: Vec<String> = counts
        .statuses
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(status, count)| format!("{status}={count}"))
        .collect();
    let _ = writeln!(out, "status: {}", statuses.join(" "));

    let mut categories: Vec<String> = counts
        .categories
        .iter()
        .map(|(name, count)| format!("{name}={count}"))
        .collect();
    categories.push(format!("(none)={}", counts.uncategorized));
    let _ = writeln!(out, "categories: {}", categories.join(" "));

    let mut tags: Vec<String> = counts
        .tags
        .iter()
        .map(|(name, count)| format!("{name}={count}"))
        .collect();
    tags.push(format!("(none)={}", counts.untagged));
    let _ = writeln!(out, "tags: {}", tags.join(" "));

    let _ = writeln!(
        out,
        "trackers: {} known, {} trackerless",
        counts.trackers.len(),
        counts.trackerless
    );
    out
}

pub(crate) fn status_line(
    version: u64,
    shown: usize,
    server: Option<&ServerState>,
    peak_download: Option<u64>,
) -> String {
    let mut line = format!("[v{version}] {shown} shown");
    if let Some(server) = server {
        let _ = write!(
            line,
            ", down {}, up {}",
            format_rate(server.download_bps),
            format_rate(server.upload_bps)
        );
    }
    if let Some(peak) = peak_download {
        let _ = write!(line, ", peak down {}", format_rate(peak));
    }
    line
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes;
    let mut remainder = 0;
    let mut unit = 0;
    while value >= 1024 && unit < UNITS.len() - 1 {
        remainder = value % 1024;
        value /= 1024;
        unit += 1;
    }
    if unit == 0 {
        format!("{value} {}", UNITS[unit])
    } else {
        format!("{value}.{} {}", remainder * 10 / 1024, UNITS[unit])
    }
}

pub(crate) fn format_rate(bps: u64) -> String {
    format!("{}/s", format_bytes(bps))
}

/// The engine reports 8640000 (100 days) for "infinite".
pub(crate) fn format_eta(secs: i64) -> String {
    const INFINITE: i64 = 8_640_000;
    if secs <= 0 || secs >= INFINITE {
        return "-".to_string();
    }
    let (hours, rest) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if hours > 0 {
        format!("{hours}h{minutes:02}m")
    } else {
        format!("{minutes}m{seconds:02}s")
    }
}

fn format_progress(progress: f64) -> String {
    format!("{:.1}%", progress.clamp(0.0, 1.0) * 100.0)
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::TorrentState;

    #[test]
    fn byte_and_rate_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1_536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_rate(2_048), "2.0 KiB/s");
    }

    #[test]
    fn eta_formatting_handles_unknown_and_infinite() {
        assert_eq!(format_eta(0), "-");
        assert_eq!(format_eta(8_640_000), "-");
        assert_eq!(format_eta(75), "1m15s");
        assert_eq!(format_eta(3_720), "1h02m");
    }

    #[test]
    fn view_table_lists_each_torrent() {
        let torrents = vec![Torrent {
            hash: "0123456789abcdef".to_string(),
            name: "Debian ISO".to_string(),
            state: TorrentState::Downloading,
            progress: 0.5,
            download_bps: 1_024,
            ..Torrent::default()
        }];
        let table = view_table(&torrents);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("HASH"));
        assert!(lines[1].starts_with("01234567 downloading"));
        assert!(lines[1].contains("50.0%"));
        assert!(lines[1].contains("1.0 KiB/s"));
        assert!(lines[1].ends_with("Debian ISO"));
    }

    #[test]
    fn status_line_includes_server_speeds_when_known() {
        assert_eq!(status_line(3, 2, None, None), "[v3] 2 shown");
        let server = ServerState {
            download_bps: 2_048,
            ..ServerState::default()
        };
        assert_eq!(
            status_line(4, 1, Some(&server), Some(4_096)),
            "[v4] 1 shown, down 2.0 KiB/s, up 0 B/s, peak down 4.0 KiB/s"
        );
    }
}
