//! Device discovery and board identification
//!
//! A CircuitPython board shows up as a USB mass-storage volume labelled
//! `CIRCUITPY`, with a `boot_out.txt` at its root describing the firmware.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Volume label of a CircuitPython board
pub const VOLUME_NAME: &str = "CIRCUITPY";

/// Identification file written by the firmware at boot
pub const BOOT_OUT_FILE: &str = "boot_out.txt";

/// Firmware version and board id read from `boot_out.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformVersion {
    pub version: String,
    pub board_id: Option<String>,
}

/// Locate a mounted CircuitPython volume
///
/// Returns the first candidate mount point that is an existing directory.
pub fn find_device() -> Option<PathBuf> {
    let candidates = candidate_mount_points();
    debug!("Probing {} candidate mount point(s)", candidates.len());
    select_device(candidates)
}

/// Pick the first candidate that looks like a mounted board
pub fn select_device<I>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    candidates.into_iter().find(|path| {
        let is_board = path.file_name().is_some_and(|name| name == VOLUME_NAME)
            || path.join(BOOT_OUT_FILE).is_file();
        is_board && path.is_dir()
    })
}

#[cfg(target_os = "linux")]
fn candidate_mount_points() -> Vec<PathBuf> {
    match fs::read_to_string("/proc/mounts") {
        Ok(mounts) => parse_proc_mounts(&mounts)
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|name| name == VOLUME_NAME))
            .collect(),
        Err(e) => {
            debug!("Cannot read /proc/mounts: {}", e);
            Vec::new()
        }
    }
}

#[cfg(target_os = "macos")]
fn candidate_mount_points() -> Vec<PathBuf> {
    let mut volumes: Vec<PathBuf> = match fs::read_dir("/Volumes") {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(VOLUME_NAME))
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    volumes.sort();
    volumes
}

#[cfg(windows)]
fn candidate_mount_points() -> Vec<PathBuf> {
    // Drive labels are not visible through std; a board root always carries
    // boot_out.txt, which `select_device` checks.
    (b'D'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|root| root.join(BOOT_OUT_FILE).is_file())
        .collect()
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn candidate_mount_points() -> Vec<PathBuf> {
    Vec::new()
}

/// Extract mount points from `/proc/mounts` content
///
/// Whitespace in mount points is octal-escaped (`\040` for a space).
pub fn parse_proc_mounts(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|field| PathBuf::from(unescape_octal(field)))
        .collect()
}

fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value =
                (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3
        && digits[0] <= b'3'
        && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}

/// Read `boot_out.txt` at `device_root`, if present and well-formed
pub fn read_platform_version(device_root: &Path) -> Option<PlatformVersion> {
    let content = fs::read_to_string(device_root.join(BOOT_OUT_FILE)).ok()?;
    parse_boot_out(&content)
}

/// Parse `boot_out.txt` content
///
/// ```text
/// Adafruit CircuitPython 8.2.0 on 2023-05-10; Adafruit Feather M4 Express with samd51j19
/// Board ID:feather_m4_express
/// ```
pub fn parse_boot_out(content: &str) -> Option<PlatformVersion> {
    let mut lines = content.lines();
    let first = lines.next()?;
    let banner = first.split(';').next().unwrap_or(first);
    let words: Vec<&str> = banner.split_whitespace().collect();
    let version = words.len().checked_sub(3).map(|i| words[i])?;

    let board_id = lines
        .find_map(|line| line.strip_prefix("Board ID:"))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    Some(PlatformVersion {
        version: version.to_string(),
        board_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BOOT_OUT: &str = "Adafruit CircuitPython 8.2.0 on 2023-05-10; Adafruit Feather M4 Express with samd51j19\nBoard ID:feather_m4_express\nUID:C7FD1A2B3C4D\n";

    #[test]
    fn test_parse_boot_out() {
        let parsed = parse_boot_out(BOOT_OUT).expect("boot_out should parse");
        assert_eq!(parsed.version, "8.2.0");
        assert_eq!(parsed.board_id.as_deref(), Some("feather_m4_express"));
    }

    #[test]
    fn test_parse_boot_out_without_board_line() {
        let parsed = parse_boot_out(
            "Adafruit CircuitPython 7.3.3 on 2022-08-29; Raspberry Pi Pico with rp2040\n",
        )
        .expect("boot_out should parse");
        assert_eq!(parsed.version, "7.3.3");
        assert_eq!(parsed.board_id, None);
    }

    #[test]
    fn test_parse_boot_out_garbage() {
        assert_eq!(parse_boot_out(""), None);
        assert_eq!(parse_boot_out("hi\n"), None);
    }

    #[test]
    fn test_read_platform_version_from_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        assert_eq!(read_platform_version(temp_dir.path()), None);

        fs::write(temp_dir.path().join(BOOT_OUT_FILE), BOOT_OUT).expect("write boot_out");
        let parsed = read_platform_version(temp_dir.path()).expect("boot_out should be read");
        assert_eq!(parsed.version, "8.2.0");
    }

    #[test]
    fn test_parse_proc_mounts() {
        let mounts = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
/dev/sda1 /media/alex/CIRCUITPY vfat rw,nosuid,nodev 0 0
/dev/sdb1 /run/media/alex/My\\040Drive vfat rw 0 0
";
        let points = parse_proc_mounts(mounts);
        assert_eq!(
            points,
            vec![
                PathBuf::from("/"),
                PathBuf::from("/media/alex/CIRCUITPY"),
                PathBuf::from("/run/media/alex/My Drive"),
            ]
        );
    }

    #[test]
    fn test_unescape_leaves_non_escapes_alone() {
        assert_eq!(unescape_octal("plain"), "plain");
        assert_eq!(unescape_octal("tab\\011here"), "tab\there");
        assert_eq!(unescape_octal("trailing\\04"), "trailing\\04");
        assert_eq!(unescape_octal("not\\999octal"), "not\\999octal");
    }

    #[test]
    fn test_select_device() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let board = temp_dir.path().join(VOLUME_NAME);
        fs::create_dir(&board).expect("create board dir");
        let other = temp_dir.path().join("USBSTICK");
        fs::create_dir(&other).expect("create other dir");

        let missing = temp_dir.path().join("gone").join(VOLUME_NAME);
        assert_eq!(
            select_device(vec![other.clone(), missing, board.clone()]),
            Some(board)
        );

        // Any volume carrying boot_out.txt qualifies, whatever its label
        fs::write(other.join(BOOT_OUT_FILE), BOOT_OUT).expect("write boot_out");
        assert_eq!(select_device(vec![other.clone()]), Some(other));
        assert_eq!(select_device(Vec::new()), None);
    }
}
