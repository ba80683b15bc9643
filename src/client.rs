use crate::protocol::{
    self, ChunkRequest, RESP_CHUNK_OK, RESP_CHUNK_REFUSED, RESP_FILE_LIST, RESPONSE_HEADER_LEN,
    RefuseReason,
};
use crate::transport;
use anyhow::{Context, Result, anyhow, bail, ensure};
use std::io::{SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs::{self, File};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connects, optionally lists the served files, fetches one byte range and
/// writes it into `out/<name>` at the requested offset. A refusal from the
/// server is printed, not treated as a failure.
pub async fn run_client(
    host: String,
    port: u16,
    file: Option<String>,
    from: Option<u32>,
    to: Option<u32>,
    out: PathBuf,
) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let mut socket = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    socket.set_nodelay(true)?;
    eprintln!("Connected to {}.", addr);

    // With --file the listing exchange is skipped and the chunk request is
    // the first message on the connection.
    let (filename, from, to) = match file {
        Some(name) => {
            let from = from.unwrap_or(0);
            let to = to.ok_or_else(|| anyhow!("--to is required together with --file"))?;
            (name, from, to)
        }
        None => select_interactively(&mut socket).await?,
    };
    ensure!(from <= to, "invalid address range: last is less than first");

    let request = ChunkRequest {
        offset: from,
        length: to - from,
        filename,
    };
    let msg = protocol::encode_chunk_request(&request)?;
    transport::write_exact(&mut socket, msg.as_slice()).await?;
    eprintln!(
        "Request for file {} addr: {} - {} has been sent.",
        request.filename, from, to
    );

    let header = read_response_header(&mut socket).await?;
    match header.tag {
        RESP_CHUNK_REFUSED => {
            let reason = RefuseReason::from_code(header.arg)?;
            println!("Server refused, reason: {}", reason.describe());
        }
        RESP_CHUNK_OK => {
            let mut data = vec![0u8; header.arg as usize];
            transport::read_exact(&mut socket, &mut data).await?;
            let path = write_chunk_at(&out, &request.filename, from, &data).await?;
            println!(
                "Wrote {} bytes to {} at offset {}.",
                data.len(),
                path.display(),
                from
            );
        }
        other => bail!("unexpected response from server (tag {})", other),
    }
    Ok(())
}

/// Runs the listing exchange and asks on stdin which file and which byte
/// range to fetch.
async fn select_interactively(socket: &mut TcpStream) -> Result<(String, u32, u32)> {
    transport::write_exact(socket, &protocol::encode_list_request()).await?;

    let header = read_response_header(socket).await?;
    ensure!(
        header.tag == RESP_FILE_LIST,
        "unexpected response from server (tag {})",
        header.tag
    );
    let mut payload = vec![0u8; header.arg as usize];
    transport::read_exact(socket, &mut payload).await?;
    let names = protocol::decode_file_list(&payload)?;

    if names.is_empty() {
        bail!("directory contains no files, there is nothing to do");
    }
    println!("Directory contains {} files:", names.len());
    for (i, name) in names.iter().enumerate() {
        println!("{}. {}", i, name);
    }

    let number: usize = prompt("Select a file: ")?;
    ensure!(number < names.len(), "file number out of range");
    let from: u32 = prompt("Address from: ")?;
    let to: u32 = prompt("Address to (exclusive): ")?;

    Ok((names[number].clone(), from, to))
}

async fn read_response_header(socket: &mut TcpStream) -> Result<protocol::ResponseHeader> {
    let mut buf = [0u8; RESPONSE_HEADER_LEN];
    transport::read_exact(socket, &mut buf)
        .await
        .context("server closed the connection")?;
    Ok(protocol::decode_response_header(&buf))
}

/// Writes the fetched range into `dir/filename` at `offset`, creating the
/// directory and the file when missing. Existing bytes elsewhere in the file
/// are left alone.
async fn write_chunk_at(dir: &Path, filename: &str, offset: u32, data: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(filename);
    let mut file = File::options()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(u64::from(offset))).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(path)
}

fn prompt<T>(message: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    print!("{}", message);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    line.trim()
        .parse()
        .with_context(|| format!("invalid number: {:?}", line.trim()))
}
