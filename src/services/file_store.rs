//! Durable streaming writes for uploaded files.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::Path,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use uuid::Uuid;

/// Stream `stream` into `path`, replacing any existing file.
///
/// - Writes bytes incrementally to a temporary file next to `path`.
/// - Flushes and fsyncs before renaming into place.
/// - Removes the temporary file on any error.
///
/// Returns the number of bytes written.
pub async fn write_stream<S>(path: &Path, stream: S) -> io::Result<u64>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(ErrorKind::Other, "upload path missing parent directory"))?;
    fs::create_dir_all(parent).await?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    match copy_into(&tmp_path, stream).await {
        Ok(size) => {
            if let Err(err) = fs::rename(&tmp_path, path).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
            Ok(size)
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp_path).await;
            Err(err)
        }
    }
}

async fn copy_into<S>(tmp_path: &Path, stream: S) -> io::Result<u64>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(tmp_path).await?;
    let mut size = 0u64;
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}
