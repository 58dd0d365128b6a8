//! Range reads against an in-process HTTP server.
//!
//! The server runs on its own tokio runtime; the readers under test are
//! blocking and are driven from the test thread, as on a cube worker.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use raster_cube::reader::{CogReader, GeoHints, HttpRangeReader, PixelWindow, RasterAsset};
use raster_cube::{AssetRef, CogSource, CubeConfig, CubeError, RasterSource, TileCache};
use test_utils::{create_reflectance_grid, write_geotiff_to, GeoTiffSpec};
use tokio::runtime::Runtime;

struct Served {
    body: Vec<u8>,
    honour_range: bool,
    /// Range requests to answer with 503 before serving
    failures_left: AtomicUsize,
    requests: AtomicUsize,
}

async fn object_handler(State(state): State<Arc<Served>>, headers: HeaderMap) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    match range {
        Some((start, end)) if state.honour_range => {
            let first_read = start == 0;
            if !first_read
                && state
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
            let len = state.body.len();
            let end = end.min(len - 1);
            (
                StatusCode::PARTIAL_CONTENT,
                [(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len))],
                state.body[start..=end].to_vec(),
            )
                .into_response()
        }
        _ => (StatusCode::OK, state.body.clone()).into_response(),
    }
}

fn parse_range(value: &str) -> Option<(usize, usize)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Serve `body` at `/B04.tif`; returns the URL and the runtime keeping it up.
fn serve(body: Vec<u8>, honour_range: bool, failures: usize) -> (String, Arc<Served>, Runtime) {
    let state = Arc::new(Served {
        body,
        honour_range,
        failures_left: AtomicUsize::new(failures),
        requests: AtomicUsize::new(0),
    });
    let runtime = Runtime::new().unwrap();
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let url = format!("http://{}/B04.tif", listener.local_addr().unwrap());
    let app = Router::new()
        .route("/B04.tif", get(object_handler))
        .with_state(state.clone());
    runtime.spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (url, state, runtime)
}

fn sample_tiff(width: u32, height: u32) -> (Vec<u8>, Vec<u16>) {
    let data = create_reflectance_grid(width as usize, height as usize, 7, 0);
    let spec = GeoTiffSpec::sentinel(width, height, (600_000.0, 5_300_040.0), 32610);
    let mut cursor = Cursor::new(Vec::new());
    write_geotiff_to(&mut cursor, &spec, &data).unwrap();
    (cursor.into_inner(), data)
}

fn client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::new()
}

#[test]
fn test_reads_match_body_across_blocks() {
    let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let (url, state, _rt) = serve(body.clone(), true, 0);

    let mut reader = HttpRangeReader::open(client(), &url, 1024, 4, 0).unwrap();
    assert_eq!(reader.len(), 10_000);

    reader.seek(SeekFrom::Start(1000)).unwrap();
    let mut buf = vec![0u8; 3000];
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(buf, body[1000..4000]);

    reader.seek(SeekFrom::End(-10)).unwrap();
    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, body[9990..]);

    // Block 0 came with the open; blocks 1..=3 and 9 were fetched
    assert_eq!(reader.requests(), 5);
    assert_eq!(state.requests.load(Ordering::SeqCst), 5);
}

#[test]
fn test_server_ignoring_range() {
    let body: Vec<u8> = (0..5000u32).map(|i| (i % 13) as u8).collect();
    let (url, _state, _rt) = serve(body.clone(), false, 0);

    let mut reader = HttpRangeReader::open(client(), &url, 1024, 8, 0).unwrap();
    assert_eq!(reader.len(), 5000);
    let mut all = Vec::new();
    reader.read_to_end(&mut all).unwrap();
    assert_eq!(all, body);
    assert_eq!(reader.requests(), 1);
}

#[test]
fn test_transient_failure_is_retried() {
    let body = vec![7u8; 4096];
    let (url, _state, _rt) = serve(body, true, 1);

    let mut reader = HttpRangeReader::open(client(), &url, 1024, 4, 2).unwrap();
    reader.seek(SeekFrom::Start(2048)).unwrap();
    let mut buf = [0u8; 16];
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [7u8; 16]);
    assert_eq!(reader.requests(), 3);
}

#[test]
fn test_retries_exhausted() {
    let (url, _state, _rt) = serve(vec![1u8; 4096], true, 5);

    let mut reader = HttpRangeReader::open(client(), &url, 1024, 4, 1).unwrap();
    reader.seek(SeekFrom::Start(3000)).unwrap();
    let mut buf = [0u8; 4];
    assert!(reader.read_exact(&mut buf).is_err());
}

#[test]
fn test_cog_over_http() {
    let (body, data) = sample_tiff(64, 40);
    let (url, _state, _rt) = serve(body, true, 0);

    let range = HttpRangeReader::open(client(), &url, 2048, 16, 0).unwrap();
    let tiles = Arc::new(Mutex::new(TileCache::new(1 << 20)));
    let cog = CogReader::open(&url, Box::new(range), GeoHints::default(), tiles).unwrap();

    let georef = cog.georeference();
    assert_eq!((georef.width, georef.height), (64, 40));
    assert_eq!(georef.transform.c, 600_000.0);

    let window = PixelWindow { col: 10, row: 12, width: 20, height: 10 };
    let block = cog.read_window(&window).unwrap();
    for r in 0..10 {
        for c in 0..20 {
            let expected = data[(12 + r) * 64 + 10 + c] as f32;
            assert_eq!(block[[r, c]], expected, "pixel ({}, {})", c, r);
        }
    }
}

#[test]
fn test_source_reuses_open_readers() {
    let (body, _) = sample_tiff(32, 32);
    let (url, state, _rt) = serve(body, true, 0);

    let source = CogSource::new(CubeConfig::default());
    let asset = AssetRef::new(url.clone());
    let first = source.open(&asset).unwrap();
    let after_first = state.requests.load(Ordering::SeqCst);
    let second = source.open(&asset).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(state.requests.load(Ordering::SeqCst), after_first);
}

#[test]
fn test_missing_object() {
    let (url, _state, _rt) = serve(vec![0u8; 16], true, 0);
    let missing = url.replace("B04.tif", "B99.tif");

    let err = CogSource::new(CubeConfig::default())
        .open(&AssetRef::new(missing))
        .err()
        .unwrap();
    assert!(matches!(err, CubeError::OpenFailed { .. }), "{:?}", err);
}

#[test]
fn test_missing_signed_object_hides_token() {
    let (url, _state, _rt) = serve(vec![0u8; 16], true, 0);
    let signed = format!("{}?st=2020-06-01&sig=secret", url.replace("B04.tif", "B99.tif"));

    let err = CogSource::new(CubeConfig::default())
        .open(&AssetRef::new(signed))
        .err()
        .unwrap();
    let message = err.to_string();
    assert!(message.contains("/B99.tif"), "{}", message);
    assert!(message.contains("404"), "{}", message);
    assert!(!message.contains("sig="), "{}", message);
}

#[test]
fn test_failed_signed_read_hides_token() {
    let (url, _state, _rt) = serve(vec![1u8; 4096], true, 5);
    let signed = format!("{}?st=2020-06-01&sig=secret", url);

    let mut reader = HttpRangeReader::open(client(), &signed, 1024, 4, 1).unwrap();
    reader.seek(SeekFrom::Start(3000)).unwrap();
    let mut buf = [0u8; 4];
    let err = reader.read_exact(&mut buf).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("503"), "{}", message);
    assert!(!message.contains("sig="), "{}", message);
}
