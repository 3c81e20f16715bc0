//! FileSink - writes published records to disk
//!
//! Layout under `base_path`:
//! - `frames/<sequence>.png`: one image per written frame
//! - `frames.jsonl`: header of every written frame
//! - `calibration.jsonl`: every intrinsic/extrinsic record, tagged by port

use contracts::{ContractError, DataSink, PublishedFrame, PublishedRecord, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument, trace};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Keep one frame out of `every_nth` (1 keeps all)
    pub every_nth: u64,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let every_nth = match params.get("every_nth") {
            Some(s) => s
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("invalid every_nth '{}'", s))?,
            None => 1,
        };

        Ok(Self {
            base_path,
            every_nth,
        })
    }
}

#[derive(Serialize)]
struct FrameHeader<'a> {
    sequence: u64,
    width: u16,
    height: u16,
    bpp: u8,
    timestamp: Timestamp,
    file: &'a str,
}

/// Sink that writes frames as PNG and calibration as JSON lines
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    frames_dir: PathBuf,
    frame_index: BufWriter<File>,
    calibration: BufWriter<File>,
    frames_seen: u64,
}

fn open_append(path: &Path) -> std::io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

impl FileSink {
    /// Create a new FileSink, creating the output directories
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let frames_dir = config.base_path.join("frames");
        fs::create_dir_all(&frames_dir)?;

        let frame_index = open_append(&config.base_path.join("frames.jsonl"))?;
        let calibration = open_append(&config.base_path.join("calibration.jsonl"))?;

        Ok(Self {
            name: name.into(),
            config,
            frames_dir,
            frame_index,
            calibration,
            frames_seen: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config)
    }

    fn write_frame_to_disk(&mut self, frame: &PublishedFrame) -> std::io::Result<()> {
        self.frames_seen += 1;
        if (self.frames_seen - 1) % self.config.every_nth != 0 {
            trace!(sink = %self.name, sequence = frame.sequence, "frame skipped");
            return Ok(());
        }

        let filename = format!("{:08}.png", frame.sequence);
        image::save_buffer(
            self.frames_dir.join(&filename),
            &frame.pixels,
            u32::from(frame.width),
            u32::from(frame.height),
            image::ColorType::Rgb8,
        )
        .map_err(std::io::Error::other)?;

        let header = FrameHeader {
            sequence: frame.sequence,
            width: frame.width,
            height: frame.height,
            bpp: frame.bpp,
            timestamp: frame.timestamp,
            file: &filename,
        };
        serde_json::to_writer(&mut self.frame_index, &header)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.frame_index.write_all(b"\n")
    }

    fn write_calibration(&mut self, record: &PublishedRecord) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.calibration, record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.calibration.write_all(b"\n")
    }

    fn persist(&mut self, record: &PublishedRecord) -> Result<(), ContractError> {
        let result = match record {
            PublishedRecord::Frame(frame) => self.write_frame_to_disk(frame),
            PublishedRecord::Intrinsics(_) | PublishedRecord::Extrinsics(_) => {
                self.write_calibration(record)
            }
        };
        result.map_err(|e| {
            error!(sink = %self.name, port = record.port(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, record),
        fields(sink = %self.name, port = record.port())
    )]
    async fn write(&mut self, record: &PublishedRecord) -> Result<(), ContractError> {
        self.persist(record)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.frame_index.flush()?;
        self.calibration.flush()?;
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, frames = self.frames_seen, "FileSink closed");
        Ok(())
    }
}
