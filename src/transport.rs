use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Outgoing messages are chopped into blocks of this size, so a single send
/// never asks the transport to accept an arbitrarily large write.
pub const WRITE_BLOCK: usize = 512;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the stream after delivering fewer bytes than expected.
    /// The socket is dead; the connection must be dropped.
    #[error("peer closed the connection after {got} of {wanted} bytes")]
    Closed { got: usize, wanted: usize },
    #[error("socket i/o failed")]
    Io(#[from] io::Error),
}

/// What the first read of an exchange saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRead {
    /// The buffer was filled completely.
    Filled,
    /// The peer closed the connection before sending anything.
    Ended,
}

/// Reads exactly `buf.len()` bytes, concatenating short reads transparently.
pub async fn read_exact<S>(stream: &mut S, buf: &mut [u8]) -> Result<(), TransportError>
where
    S: AsyncRead + Unpin,
{
    fill_from(stream, buf, 0).await
}

/// Like [`read_exact`], except a clean close before the first byte is not an
/// error: it yields [`FirstRead::Ended`]. Used for the tag read at the top of
/// an exchange, where "the client hung up" is a valid outcome.
pub async fn read_exact_or_closed<S>(
    stream: &mut S,
    buf: &mut [u8],
) -> Result<FirstRead, TransportError>
where
    S: AsyncRead + Unpin,
{
    let first = stream.read(buf).await?;
    if first == 0 {
        return Ok(FirstRead::Ended);
    }
    fill_from(stream, buf, first).await?;
    Ok(FirstRead::Filled)
}

async fn fill_from<S>(stream: &mut S, buf: &mut [u8], mut got: usize) -> Result<(), TransportError>
where
    S: AsyncRead + Unpin,
{
    while got < buf.len() {
        let n = stream.read(&mut buf[got..]).await?;
        if n == 0 {
            return Err(TransportError::Closed {
                got,
                wanted: buf.len(),
            });
        }
        got += n;
    }
    Ok(())
}

/// Writes the entire slice, in blocks of at most [`WRITE_BLOCK`] bytes.
pub async fn write_exact<S>(stream: &mut S, bytes: &[u8]) -> Result<(), TransportError>
where
    S: AsyncWrite + Unpin,
{
    for block in bytes.chunks(WRITE_BLOCK) {
        stream.write_all(block).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn read_exact_concatenates_short_reads() {
        let (mut client, mut server) = duplex(8);
        tokio::spawn(async move {
            for part in [&b"ab"[..], b"cde", b"f"] {
                client.write_all(part).await.unwrap();
                client.flush().await.unwrap();
            }
        });

        let mut buf = [0u8; 6];
        read_exact(&mut server, &mut buf).await.unwrap();
        assert_eq!(&buf, b"abcdef");
    }

    #[tokio::test]
    async fn close_mid_message_reports_partial_count() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let mut buf = [0u8; 10];
        let err = read_exact(&mut server, &mut buf).await.unwrap_err();
        match err {
            TransportError::Closed { got, wanted } => {
                assert_eq!(got, 3);
                assert_eq!(wanted, 10);
            }
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn immediate_close_is_a_clean_end() {
        let (client, mut server) = duplex(64);
        drop(client);

        let mut buf = [0u8; 2];
        let outcome = read_exact_or_closed(&mut server, &mut buf).await.unwrap();
        assert_eq!(outcome, FirstRead::Ended);
    }

    #[tokio::test]
    async fn close_after_first_byte_is_not_clean() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"x").await.unwrap();
        drop(client);

        let mut buf = [0u8; 2];
        let err = read_exact_or_closed(&mut server, &mut buf).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed { got: 1, wanted: 2 }));
    }

    #[tokio::test]
    async fn write_exact_delivers_more_than_one_block() {
        let (mut client, mut server) = duplex(4 * WRITE_BLOCK);
        let payload: Vec<u8> = (0..WRITE_BLOCK * 2 + 37).map(|i| (i % 251) as u8).collect();
        write_exact(&mut client, &payload).await.unwrap();
        drop(client);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);
    }
}
