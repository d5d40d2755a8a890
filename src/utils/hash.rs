use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{DIGEST_ALGORITHM, STREAMING_BUFFER_SIZE};

const DIGEST_LEN: usize = 32;

/// SHA-256 content digest, rendered as `sha256:<64 lowercase hex>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Digest of an in-memory byte slice
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Lowercase hex without the algorithm tag
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", DIGEST_ALGORITHM, self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self)
    }
}

/// Error parsing a `sha256:<hex>` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest '{0}'")]
pub struct ParseDigestError(String);

impl FromStr for ContentDigest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDigestError(s.to_string());

        let hex = s
            .strip_prefix(DIGEST_ALGORITHM)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(invalid)?;
        if hex.len() != DIGEST_LEN * 2 || !hex.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(invalid());
        }

        let mut bytes = [0u8; DIGEST_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

/// Calculate the digest of a local file with blocking reads.
pub fn hash_file(path: &Path) -> io::Result<ContentDigest> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; STREAMING_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentDigest(hasher.finalize().into()))
}

/// Which side of a [`HashingTee`] failed.
#[derive(Debug, thiserror::Error)]
pub enum TeeError {
    /// Reading from the source failed
    #[error("read failed: {0}")]
    Source(#[source] io::Error),
    /// Forwarding to the sink failed
    #[error("write failed: {0}")]
    Sink(#[source] io::Error),
}

/// Stream decorator that forwards every byte read from `source` to `sink`
/// and into a running SHA-256, so the digest always covers exactly the bytes
/// that were transmitted.
///
/// Each chunk is written to the sink first and hashed second, before it is
/// handed back to the caller.
pub struct HashingTee<R, W> {
    source: R,
    sink: W,
    hasher: Sha256,
    bytes: u64,
}

impl<R, W> HashingTee<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(source: R, sink: W) -> Self {
        Self {
            source,
            sink,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Read one chunk into `buf`, forwarding it to the sink and the digest.
    /// Returns 0 at end of input.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TeeError> {
        let n = self.source.read(buf).await.map_err(TeeError::Source)?;
        if n > 0 {
            self.sink.write_all(&buf[..n]).await.map_err(TeeError::Sink)?;
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }

    /// Drive the tee until the source is exhausted.
    pub async fn copy_to_end(&mut self) -> Result<u64, TeeError> {
        let mut buffer = vec![0u8; STREAMING_BUFFER_SIZE];
        loop {
            if self.read(&mut buffer).await? == 0 {
                return Ok(self.bytes);
            }
        }
    }

    /// Bytes forwarded so far
    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes
    }

    /// Finalize the digest and give the sink back for committing.
    pub fn finalize(self) -> (ContentDigest, W) {
        (ContentDigest(self.hasher.finalize().into()), self.sink)
    }

    /// Give up without finalizing; returns the sink so it can be aborted.
    pub fn into_sink(self) -> W {
        self.sink
    }
}
