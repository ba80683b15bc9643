use crate::chunks;
use crate::exbuf::OutOfMemory;
use crate::protocol::{
    self, CHUNK_REQUEST_HEADER_LEN, ChunkRequest, EncodeError, REQ_FILE_CHUNK, REQ_FILE_LIST,
    WireError,
};
use crate::transport::{self, FirstRead, TransportError};
use anyhow::{Context, Result, ensure};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Why a connection ended early. Request-level refusals are not in here;
/// they are answered on the wire and the connection closes normally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport failed")]
    Transport(#[from] TransportError),
    #[error("protocol violation")]
    Protocol(#[from] WireError),
    #[error("directory listing failed")]
    Listing(#[from] walkdir::Error),
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),
}

impl From<EncodeError> for SessionError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Wire(e) => SessionError::Protocol(e),
            EncodeError::OutOfMemory(e) => SessionError::OutOfMemory(e),
        }
    }
}

pub async fn run_server(dir: PathBuf, port: u16) -> Result<()> {
    ensure!(dir.is_dir(), "{} is not a directory", dir.display());

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(port, dir = %dir.display(), "accepting clients");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let dir = dir.clone();
        tokio::spawn(async move {
            debug!(%peer, "client connected");
            match serve_connection(socket, &dir).await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(SessionError::Protocol(e)) => {
                    warn!(%peer, error = %e, "client is out of contract, connection dropped");
                }
                Err(e) => warn!(%peer, error = %e, "connection dropped"),
            }
        });
    }
}

/// Runs one complete exchange: an optional file-list request followed by one
/// chunk request, then the connection is done. Dropping the stream closes it.
pub async fn serve_connection<S>(mut stream: S, dir: &Path) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut tag_buf = [0u8; 2];
    if transport::read_exact_or_closed(&mut stream, &mut tag_buf).await? == FirstRead::Ended {
        debug!("client ended the connection before sending a request");
        return Ok(());
    }
    let mut tag = u16::from_be_bytes(tag_buf);

    if tag == REQ_FILE_LIST {
        let names = list_dir(dir)?;
        let msg = protocol::encode_file_list(&names)?;
        transport::write_exact(&mut stream, msg.as_slice()).await?;
        debug!(files = names.len(), "file list sent");

        if transport::read_exact_or_closed(&mut stream, &mut tag_buf).await? == FirstRead::Ended {
            debug!("client ended the connection after the listing");
            return Ok(());
        }
        tag = u16::from_be_bytes(tag_buf);
    }

    if tag != REQ_FILE_CHUNK {
        return Err(WireError::UnexpectedTag(tag).into());
    }

    let mut header_buf = [0u8; CHUNK_REQUEST_HEADER_LEN];
    transport::read_exact(&mut stream, &mut header_buf).await?;
    let header = protocol::decode_chunk_request_header(&header_buf);

    let mut name_buf = vec![0u8; usize::from(header.name_len)];
    transport::read_exact(&mut stream, &mut name_buf).await?;
    let request = ChunkRequest::from_parts(header, &name_buf)?;
    info!(
        file = %request.filename,
        offset = request.offset,
        length = request.length,
        "chunk requested"
    );

    let msg = match chunks::resolve(dir, &request.filename, request.offset, request.length).await {
        Ok(bytes) => protocol::encode_chunk_ok(&bytes)?,
        Err(reason) => protocol::encode_chunk_refused(reason)?,
    };
    transport::write_exact(&mut stream, msg.as_slice()).await?;
    debug!("chunk response sent");
    Ok(())
}

/// Regular files directly under `dir`, in filesystem iteration order.
fn list_dir(dir: &Path) -> Result<Vec<String>, walkdir::Error> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
