//! Record framing for capture files.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use thiserror::Error;

use taskscope_core::payload::RawPayload;

/// Largest payload record accepted, in bytes (256 MiB).
pub const MAX_RECORD_LEN: u32 = 256 * 1024 * 1024;

/// Size of the little-endian length prefix in front of every record.
const LEN_PREFIX_SIZE: usize = 4;

/// Errors that can occur while reading or writing capture files.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("capture truncated inside record {record}: expected {expected} bytes, found {found}")]
    Truncated {
        record: usize,
        expected: usize,
        found: usize,
    },

    #[error("record {record} is {len} bytes, larger than the {max} byte limit")]
    RecordTooLarge { record: usize, len: u32, max: u32 },

    #[error("record {record} is not a valid payload: {source}")]
    Decode {
        record: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("payload could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Iterator over the payload records of a capture stream.
///
/// Yields `None` once the stream ends at a record boundary. After an error
/// the iterator is fused and yields nothing more.
#[derive(Debug)]
pub struct PayloadReader<R> {
    reader: R,
    record: usize,
    done: bool,
}

impl<R: Read> PayloadReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            record: 0,
            done: false,
        }
    }

    /// Number of records read so far.
    pub fn records_read(&self) -> usize {
        self.record
    }

    fn read_record(&mut self) -> Result<Option<RawPayload>, CaptureError> {
        let mut prefix = [0u8; LEN_PREFIX_SIZE];
        let found = fill(&mut self.reader, &mut prefix)?;
        if found == 0 {
            return Ok(None);
        }
        if found < LEN_PREFIX_SIZE {
            return Err(CaptureError::Truncated {
                record: self.record,
                expected: LEN_PREFIX_SIZE,
                found,
            });
        }

        let len = u32::from_le_bytes(prefix);
        if len > MAX_RECORD_LEN {
            return Err(CaptureError::RecordTooLarge {
                record: self.record,
                len,
                max: MAX_RECORD_LEN,
            });
        }

        let mut body = vec![0u8; len as usize];
        let found = fill(&mut self.reader, &mut body)?;
        if found < body.len() {
            return Err(CaptureError::Truncated {
                record: self.record,
                expected: body.len(),
                found,
            });
        }

        let payload = RawPayload::from_json(&body).map_err(|source| CaptureError::Decode {
            record: self.record,
            source,
        })?;
        tracing::trace!(record = self.record, bytes = len, "read payload record");
        self.record += 1;
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for PayloadReader<R> {
    type Item = Result<RawPayload, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read into `buf` until it is full or the reader is exhausted. Returns the
/// number of bytes read.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read every payload in a capture stream.
pub fn read_payloads<R: Read>(reader: R) -> Result<Vec<RawPayload>, CaptureError> {
    PayloadReader::new(reader).collect()
}

/// Read every payload in the capture file at `path`.
pub fn read_file(path: &Path) -> Result<Vec<RawPayload>, CaptureError> {
    let file = File::open(path)?;
    let payloads = read_payloads(BufReader::new(file))?;
    tracing::debug!(path = %path.display(), records = payloads.len(), "read capture file");
    Ok(payloads)
}

/// Write `payloads` as consecutive length-prefixed records.
pub fn write_payloads<W: Write>(writer: &mut W, payloads: &[RawPayload]) -> Result<(), CaptureError> {
    for (record, payload) in payloads.iter().enumerate() {
        let body = payload.to_json().map_err(CaptureError::Encode)?;
        let len = u32::try_from(body.len())
            .ok()
            .filter(|&len| len <= MAX_RECORD_LEN)
            .ok_or(CaptureError::RecordTooLarge {
                record,
                len: u32::try_from(body.len()).unwrap_or(u32::MAX),
                max: MAX_RECORD_LEN,
            })?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&body)?;
    }
    Ok(())
}

/// Write `payloads` to a new capture file at `path`, replacing any existing one.
pub fn write_file(path: &Path, payloads: &[RawPayload]) -> Result<(), CaptureError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_payloads(&mut writer, payloads)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskscope_core::testing::{competing_pushes, skewed_clocks};

    fn encode(payloads: &[RawPayload]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_payloads(&mut buf, payloads).unwrap();
        buf
    }

    #[test]
    fn stream_round_trip() {
        let payloads = skewed_clocks();
        let bytes = encode(&payloads);
        let loaded = read_payloads(bytes.as_slice()).unwrap();
        assert_eq!(loaded, payloads);
    }

    #[test]
    fn empty_stream_has_no_records() {
        let loaded = read_payloads(&[][..]).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn truncated_prefix_rejected() {
        let mut bytes = encode(&competing_pushes());
        bytes.extend_from_slice(&[7, 0]);
        let err = read_payloads(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Truncated {
                record: 2,
                expected: 4,
                found: 2
            }
        ));
    }

    #[test]
    fn truncated_body_rejected() {
        let mut bytes = encode(&competing_pushes());
        bytes.truncate(bytes.len() - 3);
        let err = read_payloads(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, CaptureError::Truncated { record: 1, .. }));
    }

    #[test]
    fn oversized_record_rejected_before_reading() {
        let bytes = (MAX_RECORD_LEN + 1).to_le_bytes();
        let err = read_payloads(&bytes[..]).unwrap_err();
        assert!(matches!(err, CaptureError::RecordTooLarge { record: 0, .. }));
    }

    #[test]
    fn invalid_json_reports_record() {
        let mut bytes = encode(&skewed_clocks()[..1]);
        let junk = b"{not json";
        bytes.extend_from_slice(&(junk.len() as u32).to_le_bytes());
        bytes.extend_from_slice(junk);
        let err = read_payloads(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, CaptureError::Decode { record: 1, .. }));
    }

    #[test]
    fn reader_is_fused_after_error() {
        let bytes = [1u8, 0, 0, 0, b'x'];
        let mut reader = PayloadReader::new(&bytes[..]);
        assert!(matches!(reader.next(), Some(Err(CaptureError::Decode { .. }))));
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 0);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.tscap");
        let payloads = competing_pushes();

        write_file(&path, &payloads).unwrap();
        let loaded = read_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded, payloads);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("absent.tscap")).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
