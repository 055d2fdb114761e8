//! Atomic file copy implementation

use crate::types::DeployError;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Copy buffer size. Device filesystems are slow; larger buffers do not help.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copy a file atomically using the write-then-rename strategy
///
/// 1. Refuse to copy a file onto itself
/// 2. Stream into a sibling `<name>.part` file
/// 3. Flush and sync to disk
/// 4. Preserve permissions and mtime
/// 5. Rename over the destination
///
/// The destination's parent directory must already exist (see
/// [`ensure_parent_dir`](super::ensure_parent_dir)).
///
/// # Returns
/// * `Ok(u64)` - Number of bytes copied
/// * `Err(DeployError::Copy)` - with both paths and the underlying IO error
///
/// # Example
/// ```no_run
/// use circdeploy::executor::copy_file_atomic;
/// use std::path::Path;
///
/// let bytes = copy_file_atomic(Path::new("code.py"), Path::new("/media/CIRCUITPY/code.py"))?;
/// # Ok::<(), circdeploy::DeployError>(())
/// ```
pub fn copy_file_atomic(src: &Path, dest: &Path) -> Result<u64, DeployError> {
    if is_same_file(src, dest) {
        return Err(DeployError::same_file(src.to_path_buf(), dest.to_path_buf()));
    }

    let part_path = part_path_for(dest);
    let result = write_part_then_rename(src, &part_path, dest);
    if result.is_err() {
        // Best effort; the original error is what matters
        let _ = fs::remove_file(&part_path);
    }

    result.map_err(|source| DeployError::Copy {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    })
}

fn write_part_then_rename(src: &Path, part_path: &Path, dest: &Path) -> io::Result<u64> {
    let mut src_file = File::open(src)?;
    let mut part_file = File::create(part_path)?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = src_file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        part_file.write_all(&buffer[..bytes_read])?;
        total_bytes += bytes_read as u64;
    }

    part_file.sync_all()?;
    // Drop the handle before rename (required on Windows)
    drop(part_file);

    let src_metadata = fs::metadata(src)?;
    fs::set_permissions(part_path, src_metadata.permissions())?;
    let mtime = filetime::FileTime::from_last_modification_time(&src_metadata);
    filetime::set_file_mtime(part_path, mtime)?;

    fs::rename(part_path, dest)?;

    Ok(total_bytes)
}

/// `code.py` -> `code.py.part`
fn part_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("circdeploy"));
    name.push(".part");
    dest.with_file_name(name)
}

fn is_same_file(src: &Path, dest: &Path) -> bool {
    match (src.canonicalize(), dest.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
