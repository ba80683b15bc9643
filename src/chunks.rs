use crate::protocol::RefuseReason;
use std::io::SeekFrom;
use std::path::{Component, Path};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

/// Maps a requested byte range of `dir/filename` to the bytes actually
/// available, or to the refuse code sent back to the client.
///
/// Success returns `min(length, size - offset)` bytes starting at `offset`;
/// asking past the end of the file is fine as long as the offset itself is in
/// range.
pub async fn resolve(
    dir: &Path,
    filename: &str,
    offset: u32,
    length: u32,
) -> Result<Vec<u8>, RefuseReason> {
    if length == 0 {
        debug!(file = filename, "refused: requested region has length 0");
        return Err(RefuseReason::ZeroLength);
    }

    // Only plain names are served; anything that would escape the shared
    // directory is refused as if the file did not exist.
    let relative = Path::new(filename);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        warn!(file = filename, "refused: name escapes the served directory");
        return Err(RefuseReason::NoSuchFile);
    }

    let path = dir.join(relative);
    let mut file = match File::open(&path).await {
        Ok(file) => file,
        Err(_) => {
            debug!(file = filename, "refused: no such file");
            return Err(RefuseReason::NoSuchFile);
        }
    };

    let size = file
        .metadata()
        .await
        .map_err(|_| RefuseReason::NoSuchFile)?
        .len();
    if u64::from(offset) >= size {
        debug!(file = filename, offset, size, "refused: offset out of range");
        return Err(RefuseReason::OutOfRange);
    }

    let available = size - u64::from(offset);
    let count = u64::from(length).min(available) as usize;

    // A file that vanishes or shrinks between open and read is reported the
    // same way as one that never existed.
    file.seek(SeekFrom::Start(u64::from(offset)))
        .await
        .map_err(|_| RefuseReason::NoSuchFile)?;
    let mut bytes = vec![0u8; count];
    file.read_exact(&mut bytes)
        .await
        .map_err(|_| RefuseReason::NoSuchFile)?;

    debug!(file = filename, offset, count, "chunk resolved");
    Ok(bytes)
}
