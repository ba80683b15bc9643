use anyhow::Result;
use netstore::protocol::{
    self, ChunkRequest, RESP_CHUNK_OK, RESP_CHUNK_REFUSED, RESP_FILE_LIST, RefuseReason,
};
use netstore::server::serve_connection;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

fn fixture_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in [("a.txt", &b"alfa beta"[..]), ("data.bin", b"0123456789")] {
        let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
        file.write_all(content).unwrap();
    }
    std::fs::create_dir(dir.path().join("subdir")).unwrap();
    dir
}

/// Binds an ephemeral port and serves exactly one connection from it.
async fn one_shot_server(dir: PathBuf) -> Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        // Protocol violations are expected in some tests; the connection is
        // simply dropped either way.
        let _ = serve_connection(socket, &dir).await;
    });
    Ok((addr, handle))
}

async fn read_header(socket: &mut TcpStream) -> protocol::ResponseHeader {
    let mut buf = [0u8; protocol::RESPONSE_HEADER_LEN];
    socket.read_exact(&mut buf).await.unwrap();
    protocol::decode_response_header(&buf)
}

#[tokio::test]
async fn full_exchange_over_tcp() -> Result<()> {
    let dir = fixture_dir();
    let (addr, handle) = one_shot_server(dir.path().to_path_buf()).await?;
    let mut socket = TcpStream::connect(&addr).await?;

    // Listing: regular files only, subdirectories are not served.
    socket.write_all(&protocol::encode_list_request()).await?;
    let header = read_header(&mut socket).await;
    assert_eq!(header.tag, RESP_FILE_LIST);
    let mut payload = vec![0u8; header.arg as usize];
    socket.read_exact(&mut payload).await?;
    let mut names = protocol::decode_file_list(&payload)?;
    names.sort();
    assert_eq!(names, ["a.txt", "data.bin"]);

    // Chunk past the end of the file: clipped to what is available.
    let request = ChunkRequest {
        offset: 5,
        length: 100,
        filename: "data.bin".into(),
    };
    let msg = protocol::encode_chunk_request(&request)?;
    socket.write_all(msg.as_slice()).await?;

    let header = read_header(&mut socket).await;
    assert_eq!(header.tag, RESP_CHUNK_OK);
    assert_eq!(header.arg, 5);
    let mut data = vec![0u8; 5];
    socket.read_exact(&mut data).await?;
    assert_eq!(data, b"56789");

    handle.await?;
    Ok(())
}

#[tokio::test]
async fn out_of_range_offset_is_refused_over_tcp() -> Result<()> {
    let dir = fixture_dir();
    let (addr, handle) = one_shot_server(dir.path().to_path_buf()).await?;
    let mut socket = TcpStream::connect(&addr).await?;

    let request = ChunkRequest {
        offset: 10,
        length: 1,
        filename: "data.bin".into(),
    };
    let msg = protocol::encode_chunk_request(&request)?;
    socket.write_all(msg.as_slice()).await?;

    let header = read_header(&mut socket).await;
    assert_eq!(header.tag, RESP_CHUNK_REFUSED);
    assert_eq!(
        RefuseReason::from_code(header.arg)?,
        RefuseReason::OutOfRange
    );

    // One exchange per connection: the server closes after responding.
    let mut rest = Vec::new();
    socket.read_to_end(&mut rest).await?;
    assert!(rest.is_empty());

    handle.await?;
    Ok(())
}

#[tokio::test]
async fn rogue_tag_gets_no_response() -> Result<()> {
    let dir = fixture_dir();
    let (addr, handle) = one_shot_server(dir.path().to_path_buf()).await?;
    let mut socket = TcpStream::connect(&addr).await?;

    socket.write_all(&99u16.to_be_bytes()).await?;

    let mut rest = Vec::new();
    socket.read_to_end(&mut rest).await?;
    assert!(rest.is_empty());

    handle.await?;
    Ok(())
}

#[tokio::test]
async fn connect_and_hang_up_is_fine() -> Result<()> {
    let dir = fixture_dir();
    let (addr, handle) = one_shot_server(dir.path().to_path_buf()).await?;
    let socket = TcpStream::connect(&addr).await?;
    drop(socket);

    // The handler exits cleanly; a panic inside it would surface here.
    handle.await?;
    Ok(())
}
