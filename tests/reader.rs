use esbulk::reader::{DecodePolicy, LineReader, ReadSummary, ReaderError};
use esbulk::record::Record;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

fn record_line(id: usize) -> String {
    format!(
        r#"{{"case_id":"case-{id}","title":"title {id}","court":"c","decide_date":"2019-01-{day:02}","paragraphs":["p1",{{"n":{id}}}]}}"#,
        day = id % 28 + 1
    )
}

fn write_lines(lines: &[String], trailer: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(lines.join("\n").as_bytes()).unwrap();
    file.write_all(trailer.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

async fn read_path(
    path: &Path,
    policy: DecodePolicy,
    capacity: usize,
) -> (Result<ReadSummary, ReaderError>, Vec<Record>) {
    let (tx, mut rx) = mpsc::channel(capacity);
    let reader = LineReader::new(path).decode_policy(policy);
    let task = tokio::task::spawn_blocking(move || reader.read_into(&tx));

    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    (task.await.unwrap(), records)
}

#[tokio::test]
async fn one_record_per_line_and_nothing_for_trailing_empty_line() {
    let lines: Vec<String> = (0..50).map(record_line).collect();
    let file = write_lines(&lines, "\n\n");

    // a tiny channel forces the reader to block on a full queue
    let (result, records) = read_path(file.path(), DecodePolicy::FailFast, 2).await;
    let summary = result.unwrap();

    assert_eq!(records.len(), 50);
    assert_eq!(summary.emitted, 50);
    assert_eq!(summary.lines, 51);
    assert!(!summary.interrupted);
    assert_eq!(records[0].case_id, "case-0");
    assert_eq!(records[49].paragraphs.len(), 2);
}

#[tokio::test]
async fn last_line_without_newline_is_read() {
    let lines: Vec<String> = (0..3).map(record_line).collect();
    let file = write_lines(&lines, "");

    let (result, records) = read_path(file.path(), DecodePolicy::FailFast, 8).await;
    assert_eq!(result.unwrap().emitted, 3);
    assert_eq!(records[2].case_id, "case-2");
}

#[tokio::test]
async fn long_lines_are_not_truncated() {
    let long_title = "x".repeat(256 * 1024);
    let line = format!(r#"{{"case_id":"big","title":"{long_title}"}}"#);
    let file = write_lines(&[line], "\n");

    let (result, records) = read_path(file.path(), DecodePolicy::FailFast, 1).await;
    assert_eq!(result.unwrap().emitted, 1);
    assert_eq!(records[0].title.len(), long_title.len());
}

#[tokio::test]
async fn fail_fast_stops_at_first_bad_line() {
    let lines = vec![record_line(1), "{\"case_id\": ".to_string(), record_line(3)];
    let file = write_lines(&lines, "\n");

    let (result, records) = read_path(file.path(), DecodePolicy::FailFast, 8).await;
    assert!(matches!(result, Err(ReaderError::Decode { line: 2, .. })));
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn skip_policy_counts_bad_lines() {
    let lines = vec![
        record_line(1),
        "garbage".to_string(),
        record_line(3),
        "{\"case_id\": 12}".to_string(),
    ];
    let file = write_lines(&lines, "\n");

    let (result, records) = read_path(file.path(), DecodePolicy::Skip, 8).await;
    let summary = result.unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn gzip_input_is_decompressed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cases.ndjson.gz");

    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::fast());
    for id in 0..10 {
        writeln!(encoder, "{}", record_line(id)).unwrap();
    }
    encoder.finish().unwrap();

    let (result, records) = read_path(&path, DecodePolicy::FailFast, 4).await;
    assert_eq!(result.unwrap().emitted, 10);
    assert_eq!(records[9].case_id, "case-9");
}

#[tokio::test]
async fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let (result, records) =
        read_path(&dir.path().join("absent.ndjson"), DecodePolicy::FailFast, 1).await;
    assert!(matches!(result, Err(ReaderError::Open { .. })));
    assert!(records.is_empty());
}
