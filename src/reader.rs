//! NDJSON line reader feeding decoded records into a bounded channel.
//!
//! The reader is synchronous and meant to run on a blocking thread
//! (`tokio::task::spawn_blocking`); it hands records to async consumers via
//! `Sender::blocking_send`, so a full channel parks the reader.

use crate::record::Record;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("read error after line {line}: {source}")]
    Io { line: u64, source: io::Error },
    #[error("line {line}: invalid record ({preview:?}): {source}")]
    Decode {
        line: u64,
        preview: String,
        source: serde_json::Error,
    },
}

/// What to do with a line that does not decode into a [`Record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Stop reading and report the offending line.
    #[default]
    FailFast,
    /// Log, count, and move on.
    Skip,
}

impl FromStr for DecodePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" | "fail-fast" => Ok(DecodePolicy::FailFast),
            "skip" => Ok(DecodePolicy::Skip),
            other => Err(format!("unsupported decode policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Physical lines consumed, blank ones included.
    pub lines: u64,
    pub emitted: u64,
    pub skipped: u64,
    /// Set when the consumer went away before end of file.
    pub interrupted: bool,
}

pub struct LineReader {
    path: PathBuf,
    policy: DecodePolicy,
}

impl LineReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: DecodePolicy::default(),
        }
    }

    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn open(&self) -> Result<Box<dyn BufRead + Send>, ReaderError> {
        let file = File::open(&self.path).map_err(|source| ReaderError::Open {
            path: self.path.clone(),
            source,
        })?;

        let is_gzip = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

        let inner: Box<dyn Read + Send> = if is_gzip {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        Ok(Box::new(BufReader::with_capacity(64 * 1024, inner)))
    }

    /// Read the whole file, sending one record per non-blank line.
    pub fn read_into(&self, tx: &Sender<Record>) -> Result<ReadSummary, ReaderError> {
        let mut reader = self.open()?;
        info!("reader: streaming {}", self.path.display());
        self.read_from(&mut reader, tx)
    }

    /// Same as [`read_into`](Self::read_into) over an already open source.
    pub fn read_from<R: BufRead + ?Sized>(
        &self,
        reader: &mut R,
        tx: &Sender<Record>,
    ) -> Result<ReadSummary, ReaderError> {
        let mut summary = ReadSummary::default();
        let mut buf = Vec::with_capacity(4 * 1024);

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| ReaderError::Io {
                    line: summary.lines,
                    source,
                })?;
            if read == 0 {
                break;
            }
            summary.lines += 1;

            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let record = match serde_json::from_slice::<Record>(line) {
                Ok(record) => record,
                Err(source) => match self.policy {
                    DecodePolicy::FailFast => {
                        return Err(ReaderError::Decode {
                            line: summary.lines,
                            preview: preview(line),
                            source,
                        });
                    }
                    DecodePolicy::Skip => {
                        warn!("reader: skipping line {}: {}", summary.lines, source);
                        summary.skipped += 1;
                        continue;
                    }
                },
            };

            if tx.blocking_send(record).is_err() {
                debug!("reader: receiver closed at line {}", summary.lines);
                summary.interrupted = true;
                return Ok(summary);
            }
            summary.emitted += 1;
        }

        info!(
            "reader: finished {} ({} lines, {} records, {} skipped)",
            self.path.display(),
            summary.lines,
            summary.emitted,
            summary.skipped
        );
        Ok(summary)
    }
}

fn preview(line: &[u8]) -> String {
    String::from_utf8_lossy(line).chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    fn read_all(input: &str, policy: DecodePolicy) -> (Result<ReadSummary, ReaderError>, Vec<Record>) {
        let (tx, mut rx) = mpsc::channel(64);
        let reader = LineReader::new("inline.ndjson").decode_policy(policy);
        let result = reader.read_from(&mut Cursor::new(input.as_bytes()), &tx);
        drop(tx);

        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        (result, records)
    }

    #[test]
    fn handles_crlf_and_blank_lines() {
        let (result, records) = read_all(
            "{\"case_id\":\"a\"}\r\n\r\n   \n{\"case_id\":\"b\"}\r\n",
            DecodePolicy::FailFast,
        );
        let summary = result.unwrap();
        assert_eq!(summary.lines, 4);
        assert_eq!(summary.emitted, 2);
        assert_eq!(records[1].case_id, "b");
    }

    #[test]
    fn fail_fast_reports_line_number() {
        let (result, records) = read_all(
            "{\"case_id\":\"a\"}\nnot json\n{\"case_id\":\"c\"}\n",
            DecodePolicy::FailFast,
        );
        match result {
            Err(ReaderError::Decode { line, preview, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(preview, "not json");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn skip_policy_continues_past_bad_lines() {
        let (result, records) = read_all(
            "\"just a string\"\n{\"case_id\":\"a\"}\n{broken\n{\"case_id\":\"c\"}",
            DecodePolicy::Skip,
        );
        let summary = result.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.emitted, 2);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn stops_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let reader = LineReader::new("inline.ndjson");
        let summary = reader
            .read_from(&mut Cursor::new(b"{}\n{}\n".as_slice()), &tx)
            .unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.emitted, 0);
    }

    #[test]
    fn parses_decode_policy() {
        assert_eq!("skip".parse::<DecodePolicy>(), Ok(DecodePolicy::Skip));
        assert_eq!("fail".parse::<DecodePolicy>(), Ok(DecodePolicy::FailFast));
        assert!("ignore".parse::<DecodePolicy>().is_err());
    }
}
