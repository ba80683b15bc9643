use crate::exbuf::{ExBuffer, OutOfMemory};
use thiserror::Error;

/// Default port shared by the server and the client.
pub const DEFAULT_PORT: u16 = 6543;

// Request tags (client -> server).
pub const REQ_FILE_LIST: u16 = 1;
pub const REQ_FILE_CHUNK: u16 = 2;

// Response tags (server -> client).
pub const RESP_FILE_LIST: u16 = 1;
pub const RESP_CHUNK_REFUSED: u16 = 2;
pub const RESP_CHUNK_OK: u16 = 3;

/// Fixed part of a chunk request after the tag: offset, length, name length.
pub const CHUNK_REQUEST_HEADER_LEN: usize = 10;

/// Fixed size of every response header: tag plus one 4-byte argument.
pub const RESPONSE_HEADER_LEN: usize = 6;

/// Filenames in a list response are joined with this byte.
pub const LIST_SEPARATOR: u8 = b'|';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected message tag {0}")]
    UnexpectedTag(u16),
    #[error("file name of {0} bytes does not fit the 16-bit length field")]
    NameTooLong(usize),
    #[error("payload of {0} bytes does not fit the 32-bit length field")]
    PayloadTooLong(usize),
    #[error("chunk request declared {declared} name bytes but carried {got}")]
    NameLengthMismatch { declared: usize, got: usize },
    #[error("file name is not valid utf-8")]
    InvalidName,
    #[error("unknown refuse code {0}")]
    UnknownRefuseCode(u32),
}

/// Why a chunk request was refused. The codes are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefuseReason {
    NoSuchFile,
    OutOfRange,
    ZeroLength,
}

impl RefuseReason {
    pub fn code(self) -> u32 {
        match self {
            RefuseReason::NoSuchFile => 1,
            RefuseReason::OutOfRange => 2,
            RefuseReason::ZeroLength => 3,
        }
    }

    pub fn from_code(code: u32) -> Result<Self, WireError> {
        match code {
            1 => Ok(RefuseReason::NoSuchFile),
            2 => Ok(RefuseReason::OutOfRange),
            3 => Ok(RefuseReason::ZeroLength),
            other => Err(WireError::UnknownRefuseCode(other)),
        }
    }

    /// The reason as shown to the person running the client.
    pub fn describe(self) -> &'static str {
        match self {
            RefuseReason::NoSuchFile => "Invalid file name.",
            RefuseReason::OutOfRange => "Invalid starting file address (out of range).",
            RefuseReason::ZeroLength => "Region has length 0.",
        }
    }
}

/// A decoded request for `length` bytes of `filename` starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub offset: u32,
    pub length: u32,
    pub filename: String,
}

/// The fixed-layout part of a chunk request, before the name bytes arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRequestHeader {
    pub offset: u32,
    pub length: u32,
    pub name_len: u16,
}

/// Tag plus 4-byte argument common to every response. The argument is the
/// payload length for list and chunk-ok responses, the refuse code otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub tag: u16,
    pub arg: u32,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),
}

pub fn encode_list_request() -> [u8; 2] {
    REQ_FILE_LIST.to_be_bytes()
}

pub fn encode_chunk_request(req: &ChunkRequest) -> Result<ExBuffer, EncodeError> {
    let name = req.filename.as_bytes();
    let name_len = u16::try_from(name.len()).map_err(|_| WireError::NameTooLong(name.len()))?;

    let mut buf = ExBuffer::with_capacity(2 + CHUNK_REQUEST_HEADER_LEN + name.len())?;
    buf.append(&REQ_FILE_CHUNK.to_be_bytes())?;
    buf.append(&req.offset.to_be_bytes())?;
    buf.append(&req.length.to_be_bytes())?;
    buf.append(&name_len.to_be_bytes())?;
    buf.append(name)?;
    Ok(buf)
}

pub fn decode_chunk_request_header(header: &[u8; CHUNK_REQUEST_HEADER_LEN]) -> ChunkRequestHeader {
    ChunkRequestHeader {
        offset: u32::from_be_bytes(header[0..4].try_into().unwrap()),
        length: u32::from_be_bytes(header[4..8].try_into().unwrap()),
        name_len: u16::from_be_bytes(header[8..10].try_into().unwrap()),
    }
}

impl ChunkRequest {
    /// Joins a decoded header with the name bytes that followed it. The byte
    /// count must match the declared length exactly.
    pub fn from_parts(header: ChunkRequestHeader, name: &[u8]) -> Result<Self, WireError> {
        if name.len() != usize::from(header.name_len) {
            return Err(WireError::NameLengthMismatch {
                declared: usize::from(header.name_len),
                got: name.len(),
            });
        }
        let filename = String::from_utf8(name.to_vec()).map_err(|_| WireError::InvalidName)?;
        Ok(ChunkRequest {
            offset: header.offset,
            length: header.length,
            filename,
        })
    }
}

/// Assembles a complete list response: tag, payload length, names joined by
/// `|`. The length field is patched in once the payload size is known.
pub fn encode_file_list<S: AsRef<str>>(names: &[S]) -> Result<ExBuffer, EncodeError> {
    let mut buf = ExBuffer::new()?;
    buf.append(&RESP_FILE_LIST.to_be_bytes())?;
    buf.append(&0u32.to_be_bytes())?;

    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            buf.append(&[LIST_SEPARATOR])?;
        }
        buf.append(name.as_ref().as_bytes())?;
    }

    let payload_len = buf.len() - RESPONSE_HEADER_LEN;
    let payload_len =
        u32::try_from(payload_len).map_err(|_| WireError::PayloadTooLong(payload_len))?;
    buf.overwrite(2, &payload_len.to_be_bytes());
    Ok(buf)
}

/// Splits a list response payload on `|`. An empty payload is an empty
/// listing, not an error.
pub fn decode_file_list(payload: &[u8]) -> Result<Vec<String>, WireError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload
        .split(|b| *b == LIST_SEPARATOR)
        .map(|name| String::from_utf8(name.to_vec()).map_err(|_| WireError::InvalidName))
        .collect()
}

/// Assembles a complete chunk-ok response: tag, byte count, raw file bytes.
pub fn encode_chunk_ok(data: &[u8]) -> Result<ExBuffer, EncodeError> {
    let count = u32::try_from(data.len()).map_err(|_| WireError::PayloadTooLong(data.len()))?;
    let mut buf = ExBuffer::with_capacity(RESPONSE_HEADER_LEN + data.len())?;
    buf.append(&RESP_CHUNK_OK.to_be_bytes())?;
    buf.append(&count.to_be_bytes())?;
    buf.append(data)?;
    Ok(buf)
}

pub fn encode_chunk_refused(reason: RefuseReason) -> Result<ExBuffer, EncodeError> {
    let mut buf = ExBuffer::with_capacity(RESPONSE_HEADER_LEN)?;
    buf.append(&RESP_CHUNK_REFUSED.to_be_bytes())?;
    buf.append(&reason.code().to_be_bytes())?;
    Ok(buf)
}

pub fn decode_response_header(header: &[u8; RESPONSE_HEADER_LEN]) -> ResponseHeader {
    ResponseHeader {
        tag: u16::from_be_bytes(header[0..2].try_into().unwrap()),
        arg: u32::from_be_bytes(header[2..6].try_into().unwrap()),
    }
}
