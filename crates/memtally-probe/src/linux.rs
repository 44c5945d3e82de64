//! Linux probes backed by the `/proc` filesystem.

use std::fs;
use std::io::{BufRead, BufReader};

use crate::ProbeError;

const STAT_PATH: &str = "/proc/self/stat";

/// Resident set size of the current process in bytes.
///
/// Field 24 of `/proc/self/stat` is the RSS in pages; multiplying by the
/// page size converts it to bytes.
pub(crate) fn resident_set_size() -> Result<u64, ProbeError> {
    let stat = fs::read_to_string(STAT_PATH).map_err(|source| ProbeError::Io {
        path: STAT_PATH.into(),
        source,
    })?;
    let pages = stat_rss_pages(&stat).ok_or_else(|| ProbeError::Malformed(STAT_PATH.into()))?;
    Ok(pages * crate::page_size())
}

/// Extracts the RSS page count (field 24) from a `/proc/<pid>/stat` line.
///
/// The comm field is parenthesized and may itself contain spaces, so field
/// counting restarts after the final `)`; the remainder begins at field 3.
fn stat_rss_pages(stat: &str) -> Option<u64> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(21)?.parse().ok()
}

pub(crate) fn smaps_field_sum(field: &str, pid: Option<u32>) -> Result<u64, ProbeError> {
    let path = match pid {
        Some(pid) => format!("/proc/{pid}/smaps"),
        None => "/proc/self/smaps".to_string(),
    };
    let file = fs::File::open(&path).map_err(|source| ProbeError::Io {
        path: path.clone(),
        source,
    })?;

    let mut bytes = 0u64;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ProbeError::Io {
            path: path.clone(),
            source,
        })?;
        if let Some(kb) = field_kilobytes(&line, field) {
            bytes += kb * 1024;
        }
    }
    Ok(bytes)
}

/// Parses one smaps stat line of the form `Field:   1234 kB`.
///
/// `field` carries the trailing colon, matching the smaps spelling. Returns
/// `None` for region header lines and for other fields.
fn field_kilobytes(line: &str, field: &str) -> Option<u64> {
    let rest = line.strip_prefix(field)?;
    rest.trim().strip_suffix("kB")?.trim_end().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_rss_pages_reads_field_24() {
        // pid 1234, comm "cat", fields 3..: state at index 0, rss at index 21.
        let stat = "1234 (cat) R 1 1234 1234 0 -1 4194304 123 0 0 0 1 2 0 0 \
                    20 0 1 0 12345 6172672 321 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";
        assert_eq!(stat_rss_pages(stat), Some(321));
    }

    #[test]
    fn stat_rss_pages_survives_spaces_in_comm() {
        let stat = "42 (tmux: server) S 1 42 42 0 -1 4194368 9 0 0 0 0 0 0 0 \
                    20 0 1 0 100 1000 77 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0";
        assert_eq!(stat_rss_pages(stat), Some(77));
    }

    #[test]
    fn stat_rss_pages_rejects_truncated_input() {
        assert_eq!(stat_rss_pages("1 (init) S 0 1"), None);
        assert_eq!(stat_rss_pages("no parenthesis here"), None);
    }

    #[test]
    fn field_kilobytes_matches_exact_field_only() {
        assert_eq!(field_kilobytes("Rss:                 196 kB", "Rss:"), Some(196));
        assert_eq!(field_kilobytes("Private_Dirty:         4 kB", "Rss:"), None);
        // Region header lines have no kB suffix.
        assert_eq!(
            field_kilobytes("7f3b4c000000-7f3b4c021000 rw-p 00000000 00:00 0", "Rss:"),
            None
        );
    }

    #[test]
    fn smaps_sum_over_own_process_is_nonzero() {
        let rss = smaps_field_sum("Rss:", None).expect("smaps readable");
        assert!(rss > 0, "a running process has resident pages");
    }

    #[test]
    fn resident_set_size_is_plausible() {
        let rss = resident_set_size().expect("stat readable");
        assert!(rss > 0);
        assert_eq!(rss % crate::page_size(), 0);
    }
}
