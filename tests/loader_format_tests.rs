use arrow::array::{ArrayRef, Float32Array};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use colorizer_engine::core::ElementType;
use colorizer_engine::error::{ErrorKind, PipelineError};
use colorizer_engine::loader::{ByteSource, ContainerFormat, FormatLoader, MemorySource, UrlSource};
use parquet::arrow::ArrowWriter;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn parquet_bytes(values: Vec<f32>) -> Vec<u8> {
    let column: ArrayRef = Arc::new(Float32Array::from(values));
    let batch = RecordBatch::try_from_iter(vec![("v", column)]).unwrap();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buffer
}

/// Serves one canned HTTP response on a loopback port and returns its URL
fn serve_once(head: &'static str, body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/feature.json", listener.local_addr().unwrap());
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        let mut stream = reader.into_inner();
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(body);
    });
    url
}

#[test]
fn test_format_from_extension() {
    assert_eq!(ContainerFormat::from_url("a/b/area.json"), Some(ContainerFormat::Json));
    assert_eq!(ContainerFormat::from_url("area.PARQUET"), Some(ContainerFormat::Parquet));
    assert_eq!(ContainerFormat::from_url("area.pq"), Some(ContainerFormat::Parquet));
    assert_eq!(
        ContainerFormat::from_url("https://host/data/area.json?token=x.parquet"),
        Some(ContainerFormat::Json)
    );
    assert_eq!(ContainerFormat::from_url("https://host.org/area"), None);
    assert_eq!(ContainerFormat::from_url("area.csv"), None);
}

#[test]
fn test_unknown_extension_tries_json_first() {
    let loader = FormatLoader::new(Arc::new(MemorySource::new()), 4096);
    let record = loader
        .decode("blob/area", Bytes::from_static(br#"{"data": [1, 2]}"#), ElementType::F32)
        .unwrap();
    assert_eq!(record.len(), 2);
}

#[test]
fn test_unknown_extension_falls_back_to_parquet() {
    let loader = FormatLoader::new(Arc::new(MemorySource::new()), 4096);
    let record = loader
        .decode("blob/area", Bytes::from(parquet_bytes(vec![5.0, 6.0, 7.0])), ElementType::F32)
        .unwrap();
    assert_eq!(record.data.as_f32(), Some(&[5.0, 6.0, 7.0][..]));
}

#[test]
fn test_unrecognised_bytes_name_both_formats() {
    let loader = FormatLoader::new(Arc::new(MemorySource::new()), 4096);
    let err = loader
        .decode("blob/area", Bytes::from_static(b"\x00\x01 neither"), ElementType::F32)
        .unwrap_err();

    match &err {
        PipelineError::Parse { attempted, .. } => {
            assert_eq!(attempted, &vec![ContainerFormat::Json, ContainerFormat::Parquet]);
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
    assert!(err.to_string().contains("JSON or Parquet"));
}

#[test]
fn test_explicit_extension_skips_fallback() {
    let loader = FormatLoader::new(Arc::new(MemorySource::new()), 4096);
    let err = loader
        .decode("area.json", Bytes::from(parquet_bytes(vec![1.0])), ElementType::F32)
        .unwrap_err();

    match err {
        PipelineError::Parse { attempted, .. } => assert_eq!(attempted, vec![ContainerFormat::Json]),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_local_file_is_memory_mapped() {
    let mut file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
    file.write_all(&parquet_bytes(vec![1.0, 2.0])).unwrap();
    file.flush().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let loader = FormatLoader::new(Arc::new(UrlSource::default()), 4096);
    let record = loader.load_blocking(&path, ElementType::F32).unwrap();
    assert_eq!(record.data.as_f32(), Some(&[1.0, 2.0][..]));

    let prefixed = loader
        .load_blocking(&format!("file://{}", path), ElementType::F32)
        .unwrap();
    assert_eq!(prefixed.len(), 2);
}

#[test]
fn test_empty_local_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let bytes = UrlSource::default()
        .fetch(file.path().to_str().unwrap())
        .unwrap();
    assert!(bytes.is_empty());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let loader = FormatLoader::new(Arc::new(UrlSource::default()), 4096);

    let err = loader
        .load_blocking(path.to_str().unwrap(), ElementType::F32)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_memory_source_misses_are_io_errors() {
    let source = MemorySource::new();
    source.insert("known.json", Bytes::from_static(b"{}"));
    assert!(source.fetch("known.json").is_ok());
    assert_eq!(source.fetch("unknown.json").unwrap_err().kind(), ErrorKind::Io);
}

#[tokio::test]
async fn test_async_load_runs_off_the_caller() {
    let source = Arc::new(MemorySource::new());
    source.insert("area.json", Bytes::from_static(br#"{"data": [9, 8, 7]}"#));
    let loader = Arc::new(FormatLoader::new(source, 4096));

    let record = loader.load("area.json", ElementType::U8).await.unwrap();
    assert_eq!(record.data.as_u8(), Some(&[9, 8, 7][..]));
}

#[test]
fn test_remote_fetch_reads_body() {
    let body: &[u8] = br#"{"data": [1, 2, 3]}"#;
    let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 19\r\nConnection: close\r\n\r\n", body);

    let loader = FormatLoader::new(Arc::new(UrlSource::new(Duration::from_secs(5))), 4096);
    let record = loader.load_blocking(&url, ElementType::U8).unwrap();
    assert_eq!(record.data.as_u8(), Some(&[1, 2, 3][..]));
}

#[test]
fn test_absurd_content_length_is_an_io_error() {
    let url = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Length: 9000000000000000000\r\n\r\n",
        b"{\"data\": []}",
    );

    let err = UrlSource::new(Duration::from_secs(5)).fetch(&url).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("fetch limit"));
}

#[test]
fn test_undeclared_body_over_limit_is_an_io_error() {
    let url = serve_once(
        "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n",
        b"0123456789abcdef0123456789abcdef",
    );

    let source = UrlSource::new(Duration::from_secs(5)).with_max_bytes(16);
    let err = source.fetch(&url).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("fetch limit"));
}

#[test]
fn test_local_file_over_limit_is_an_io_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0u8; 64]).unwrap();
    file.flush().unwrap();

    let source = UrlSource::default().with_max_bytes(32);
    let err = source.fetch(file.path().to_str().unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}
