use std::io::Write;

use bpk_model::BuildPackage;
use tracing::{debug, trace};

use crate::config::{CodecConfig, Compression};
use crate::error::{CodecError, CodecResult};
use crate::frame::{encode_record_frame, StreamHeader, FRAME_END};
use crate::record::{nests_deeper_than, package_to_record, GenericRecord, MAX_RECORD_DEPTH};

/// Result of writing a package stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of records written.
    pub records: u64,
    /// Total bytes written, header and trailer included.
    pub bytes: u64,
    /// BLAKE3 digest stored in the trailer.
    pub checksum: [u8; 32],
}

/// Writes packages to a sink one frame at a time.
///
/// The header goes out on construction; [`finish`](Self::finish) writes the
/// trailer and flushes. A writer dropped without `finish` leaves a stream
/// that readers reject as truncated. The sink is never closed: pass
/// `&mut sink` to keep using it afterwards.
pub struct PackageStreamWriter<W: Write> {
    sink: W,
    config: CodecConfig,
    hasher: blake3::Hasher,
    records: u64,
    bytes: u64,
}

impl<W: Write> PackageStreamWriter<W> {
    /// Validate `config` and write the stream header.
    pub fn new(sink: W, config: CodecConfig) -> CodecResult<Self> {
        config.validate()?;
        let mut writer = Self {
            sink,
            config,
            hasher: blake3::Hasher::new(),
            records: 0,
            bytes: 0,
        };
        let header = StreamHeader::new(writer.config.compression).to_bytes()?;
        writer.emit(&header)?;
        debug!(compression = ?writer.config.compression, "stream header written");
        Ok(writer)
    }

    /// Append one package using the built-in record shape.
    pub fn write_package(&mut self, package: &BuildPackage) -> CodecResult<()> {
        self.write_record(&package_to_record(package))
    }

    /// Append one generic record as produced by any front-end.
    ///
    /// Records nested deeper than [`MAX_RECORD_DEPTH`] are refused before
    /// anything is written.
    pub fn write_record(&mut self, record: &GenericRecord) -> CodecResult<()> {
        if nests_deeper_than(record, MAX_RECORD_DEPTH) {
            return Err(CodecError::RecordTooDeep {
                max: MAX_RECORD_DEPTH,
            });
        }
        let json =
            serde_json::to_vec(record).map_err(|e| CodecError::Serialization(e.to_string()))?;
        if json.len() > self.config.max_record_size {
            return Err(CodecError::RecordTooLarge {
                size: json.len(),
                max: self.config.max_record_size,
            });
        }

        let payload = match self.config.compression {
            Compression::None => json,
            Compression::Zstd { level } => zstd::encode_all(json.as_slice(), level)
                .map_err(|e| CodecError::Serialization(format!("zstd compression failed: {e}")))?,
        };
        // Compression can grow tiny payloads; the frame length field is still a u32.
        if payload.len() > u32::MAX as usize {
            return Err(CodecError::RecordTooLarge {
                size: payload.len(),
                max: u32::MAX as usize,
            });
        }

        let frame = encode_record_frame(&payload);
        self.emit(&frame)?;
        self.records += 1;
        trace!(record = self.records, len = payload.len(), "record frame written");
        Ok(())
    }

    /// Records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Write the trailer and flush the sink.
    pub fn finish(mut self) -> CodecResult<StreamSummary> {
        let mut trailer = Vec::with_capacity(1 + 8);
        trailer.push(FRAME_END);
        trailer.extend_from_slice(&self.records.to_le_bytes());
        self.emit(&trailer)?;

        let checksum = *self.hasher.finalize().as_bytes();
        self.sink.write_all(&checksum)?;
        self.bytes += checksum.len() as u64;
        self.sink.flush()?;

        debug!(
            records = self.records,
            bytes = self.bytes,
            checksum = %hex::encode(&checksum[..4]),
            "package stream finished"
        );
        Ok(StreamSummary {
            records: self.records,
            bytes: self.bytes,
            checksum,
        })
    }

    fn emit(&mut self, buf: &[u8]) -> CodecResult<()> {
        self.sink.write_all(buf)?;
        self.hasher.update(buf);
        self.bytes += buf.len() as u64;
        Ok(())
    }
}
