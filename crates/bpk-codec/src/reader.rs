use std::io::{self, Read};

use bpk_model::BuildPackage;
use tracing::{debug, trace, warn};

use crate::config::{Compression, DEFAULT_MAX_RECORD_SIZE};
use crate::error::{CodecError, CodecResult};
use crate::frame::{StreamHeader, FRAME_END, FRAME_RECORD, MAGIC, MAX_HEADER_SIZE};
use crate::record::{GenericRecord, RecordInterpreter};

/// Reads records back from a package stream, one frame at a time.
///
/// The source is read in small exact chunks and never past the trailer;
/// wrap unbuffered sources (files, sockets) in a `BufReader` first.
pub struct PackageStreamReader<R: Read> {
    source: R,
    header: StreamHeader,
    hasher: blake3::Hasher,
    offset: u64,
    records: u64,
    max_record_size: usize,
    done: bool,
    failed: bool,
}

impl<R: Read> PackageStreamReader<R> {
    /// Read and check the stream header.
    pub fn new(source: R) -> CodecResult<Self> {
        Self::with_max_record_size(source, DEFAULT_MAX_RECORD_SIZE)
    }

    /// Like [`new`](Self::new), rejecting any record larger than `max_record_size`.
    pub fn with_max_record_size(source: R, max_record_size: usize) -> CodecResult<Self> {
        let mut reader = Self {
            source,
            header: StreamHeader::new(Compression::None),
            hasher: blake3::Hasher::new(),
            offset: 0,
            records: 0,
            max_record_size,
            done: false,
            failed: false,
        };

        let mut magic = [0u8; 4];
        reader.fill(&mut magic)?;
        if &magic != MAGIC {
            return Err(CodecError::malformed(
                0,
                format!(
                    "invalid magic: expected {}, got {}",
                    String::from_utf8_lossy(MAGIC),
                    String::from_utf8_lossy(&magic)
                ),
            ));
        }

        let mut len = [0u8; 4];
        reader.fill(&mut len)?;
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_HEADER_SIZE {
            return Err(CodecError::malformed(
                reader.offset,
                format!("header length {len} exceeds {MAX_HEADER_SIZE}"),
            ));
        }
        let body_offset = reader.offset;
        let mut body = vec![0u8; len];
        reader.fill(&mut body)?;
        reader.header = StreamHeader::from_body(&body, body_offset)?;

        debug!(
            version = reader.header.version,
            compression = ?reader.header.compression,
            "stream header read"
        );
        Ok(reader)
    }

    /// Compression the stream was written with.
    pub fn compression(&self) -> Compression {
        self.header.compression
    }

    /// Records read so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Read the next record, or `None` once the trailer has been verified.
    ///
    /// After an error the stream position is unknown; every later call fails.
    pub fn next_record(&mut self) -> CodecResult<Option<GenericRecord>> {
        if self.failed {
            return Err(CodecError::malformed(
                self.offset,
                "stream already failed at an earlier frame",
            ));
        }
        if self.done {
            return Ok(None);
        }
        let result = self.read_frame();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn read_frame(&mut self) -> CodecResult<Option<GenericRecord>> {
        let frame_offset = self.offset;
        let mut tag = [0u8; 1];
        self.fill(&mut tag)?;
        match tag[0] {
            FRAME_RECORD => self.read_record_frame(frame_offset).map(Some),
            FRAME_END => {
                self.read_trailer(frame_offset)?;
                self.done = true;
                Ok(None)
            }
            other => Err(CodecError::malformed(
                frame_offset,
                format!("unknown frame marker 0x{other:02x}"),
            )),
        }
    }

    /// Read the next record and hand it to `interpreter`.
    ///
    /// Interpreter errors come back exactly as the interpreter raised them.
    pub fn read_package<I>(&mut self, interpreter: &I) -> Result<Option<BuildPackage>, I::Error>
    where
        I: RecordInterpreter,
        I::Error: From<CodecError>,
    {
        match self.next_record()? {
            Some(record) => interpreter.interpret(record).map(Some),
            None => Ok(None),
        }
    }

    fn read_record_frame(&mut self, frame_offset: u64) -> CodecResult<GenericRecord> {
        let mut len = [0u8; 4];
        self.fill(&mut len)?;
        let len = u32::from_le_bytes(len) as usize;
        let mut crc = [0u8; 4];
        self.fill(&mut crc)?;
        let expected_crc = u32::from_le_bytes(crc);

        if len > self.max_record_size {
            return Err(CodecError::malformed(
                frame_offset,
                format!("record length {len} exceeds {}", self.max_record_size),
            ));
        }
        let payload = self.fill_vec(len)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset = frame_offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch in record frame"
            );
            return Err(CodecError::malformed(frame_offset, "record CRC mismatch"));
        }

        let json = match self.header.compression {
            Compression::None => payload,
            Compression::Zstd { .. } => self.decompress(&payload, frame_offset)?,
        };
        let record: GenericRecord = serde_json::from_slice(&json).map_err(|e| {
            CodecError::malformed(frame_offset, format!("record is not valid JSON: {e}"))
        })?;

        self.records += 1;
        trace!(record = self.records, offset = frame_offset, len, "record frame read");
        Ok(record)
    }

    /// Inflate a zstd payload, giving up once it outgrows `max_record_size`.
    fn decompress(&self, payload: &[u8], frame_offset: u64) -> CodecResult<Vec<u8>> {
        let failed = |e: io::Error| {
            CodecError::malformed(frame_offset, format!("zstd decompression failed: {e}"))
        };
        let decoder = zstd::stream::read::Decoder::new(payload).map_err(failed)?;
        let mut json = Vec::new();
        decoder
            .take(self.max_record_size as u64 + 1)
            .read_to_end(&mut json)
            .map_err(failed)?;
        if json.len() > self.max_record_size {
            return Err(CodecError::malformed(
                frame_offset,
                format!("decompressed record exceeds {}", self.max_record_size),
            ));
        }
        Ok(json)
    }

    fn read_trailer(&mut self, frame_offset: u64) -> CodecResult<()> {
        let mut count = [0u8; 8];
        self.fill(&mut count)?;
        let count = u64::from_le_bytes(count);
        if count != self.records {
            warn!(
                offset = frame_offset,
                expected = count,
                actual = self.records,
                "record count mismatch in trailer"
            );
            return Err(CodecError::malformed(
                frame_offset,
                format!("trailer declares {count} records, stream holds {}", self.records),
            ));
        }

        let computed = *self.hasher.finalize().as_bytes();
        let mut stored = [0u8; 32];
        self.source.read_exact(&mut stored).map_err(|e| self.map_read_error(e))?;
        self.offset += stored.len() as u64;
        if stored != computed {
            warn!(
                offset = frame_offset,
                expected = %hex::encode(stored),
                actual = %hex::encode(computed),
                "stream checksum mismatch"
            );
            return Err(CodecError::malformed(frame_offset, "stream checksum mismatch"));
        }

        debug!(records = self.records, bytes = self.offset, "package stream verified");
        Ok(())
    }

    /// Read exactly `buf.len()` bytes, feeding them into the running digest.
    fn fill(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        self.source.read_exact(buf).map_err(|e| self.map_read_error(e))?;
        self.hasher.update(buf);
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Read `len` bytes into a buffer that only grows as data arrives, so a
    /// corrupted length field cannot force a large allocation.
    fn fill_vec(&mut self, len: usize) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        let read = self.source.by_ref().take(len as u64).read_to_end(&mut buf);
        read.map_err(|e| self.map_read_error(e))?;
        self.hasher.update(&buf);
        self.offset += buf.len() as u64;
        if buf.len() < len {
            return Err(CodecError::malformed(self.offset, "unexpected end of stream"));
        }
        Ok(buf)
    }

    fn map_read_error(&self, err: io::Error) -> CodecError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::malformed(self.offset, "unexpected end of stream")
        } else {
            CodecError::Io(err)
        }
    }
}

impl<R: Read> Iterator for PackageStreamReader<R> {
    type Item = CodecResult<GenericRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_record().transpose()
    }
}
