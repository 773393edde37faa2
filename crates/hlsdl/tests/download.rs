use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use hlsdl_engine::{
    DownloadError, DownloadReport, HlsDownloadConfig, HlsDownloader, ProgressCallback,
    ProgressEvent,
};
use tokio::net::TcpListener;
use tracing::instrument::WithSubscriber;
use tracing_subscriber::fmt::MakeWriter;

const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:5
#EXTINF:2.0,
seg0.ts
#EXTINF:3.5,
seg1.ts
#EXTINF:4.5,
seg2.ts
#EXT-X-ENDLIST
";

const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720
720p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=640000,RESOLUTION=854x480
/abs/480p.m3u8
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `downloader` against `url`, returning the report and the INFO log it produced.
async fn run_logged(downloader: HlsDownloader, url: &str) -> (DownloadReport, String) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    let report = downloader
        .run(url)
        .with_subscriber(subscriber)
        .await
        .unwrap();
    (report, logs.contents())
}

#[derive(Default)]
struct Origin {
    playlist: String,
    segment_delay: Duration,
    fail_segments: bool,
    segment_hits: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

async fn live_file(State(origin): State<Arc<Origin>>, UrlPath(file): UrlPath<String>) -> Response {
    if file.ends_with(".m3u8") {
        return origin.playlist.clone().into_response();
    }

    origin.segment_hits.fetch_add(1, Ordering::SeqCst);
    if origin.fail_segments {
        return StatusCode::NOT_FOUND.into_response();
    }
    let now = origin.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    origin.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(origin.segment_delay).await;
    origin.in_flight.fetch_sub(1, Ordering::SeqCst);

    format!("payload of {file}").into_response()
}

async fn spawn_origin(origin: Arc<Origin>) -> String {
    let app = Router::new()
        .route("/live/{file}", get(live_file))
        .route("/missing.m3u8", get(|| async { StatusCode::NOT_FOUND }))
        .with_state(origin);
    spawn_app(app).await
}

async fn spawn_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn media_origin(segments: usize, delay: Duration) -> Arc<Origin> {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:1\n");
    for i in 0..segments {
        playlist.push_str(&format!("#EXTINF:1.0,\nseg{i}.ts\n"));
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    Arc::new(Origin {
        playlist,
        segment_delay: delay,
        ..Default::default()
    })
}

fn downloader(output_dir: &Path, concurrency: usize) -> HlsDownloader {
    let config = HlsDownloadConfig::builder()
        .with_output_dir(output_dir)
        .with_concurrency(concurrency)
        .with_system_proxy(false)
        .build();
    HlsDownloader::new(config).unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn media_playlist_downloads_every_segment() {
    init_tracing();
    let origin = Arc::new(Origin {
        playlist: MEDIA.to_string(),
        ..Default::default()
    });
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let report = downloader(&out, 2)
        .run(&format!("{server}/live/index.m3u8"))
        .await
        .unwrap();

    let DownloadReport::Media(summary) = report else {
        panic!("expected a media report");
    };
    assert_eq!(summary.total, 3);
    assert_eq!(summary.admitted, 3);
    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.accumulated_duration, 10.0);
    assert_eq!(
        file_names(&out),
        ["index.m3u8", "seg0.ts", "seg1.ts", "seg2.ts"]
    );
    assert_eq!(
        std::fs::read_to_string(out.join("seg1.ts")).unwrap(),
        "payload of seg1.ts"
    );
}

#[tokio::test]
async fn second_run_skips_existing_segments() {
    init_tracing();
    let origin = Arc::new(Origin {
        playlist: MEDIA.to_string(),
        ..Default::default()
    });
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{server}/live/index.m3u8");

    downloader(dir.path(), 2).run(&url).await.unwrap();
    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 3);
    let modified_before = std::fs::metadata(dir.path().join("seg0.ts"))
        .unwrap()
        .modified()
        .unwrap();

    let report = downloader(dir.path(), 2).run(&url).await.unwrap();

    let DownloadReport::Media(summary) = report else {
        panic!("expected a media report");
    };
    assert_eq!(summary.admitted, 3);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.downloaded, 0);
    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 3);
    let modified_after = std::fs::metadata(dir.path().join("seg0.ts"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(modified_before, modified_after);
}

#[tokio::test]
async fn force_download_refetches_existing_segments() {
    let origin = Arc::new(Origin {
        playlist: MEDIA.to_string(),
        ..Default::default()
    });
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("seg0.ts"), "stale").unwrap();

    let config = HlsDownloadConfig::builder()
        .with_output_dir(dir.path())
        .with_force_download(true)
        .with_system_proxy(false)
        .build();
    HlsDownloader::new(config)
        .unwrap()
        .run(&format!("{server}/live/index.m3u8"))
        .await
        .unwrap();

    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("seg0.ts")).unwrap(),
        "payload of seg0.ts"
    );
}

#[tokio::test]
async fn master_playlist_lists_variants_without_downloading() {
    init_tracing();
    let origin = Arc::new(Origin {
        playlist: MASTER.to_string(),
        ..Default::default()
    });
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let report = downloader(dir.path(), 4)
        .run(&format!("{server}/live/index.m3u8"))
        .await
        .unwrap();

    let DownloadReport::Master(listings) = report else {
        panic!("expected a master report");
    };
    let urls: Vec<&str> = listings.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        [
            format!("{server}/live/720p.m3u8"),
            format!("{server}/abs/480p.m3u8"),
        ]
    );
    assert_eq!(listings[0].index, 1);
    assert_eq!(listings[1].attributes.resolution, Some((854, 480)));
    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 0);
    assert_eq!(file_names(dir.path()), ["index.m3u8"]);
}

#[tokio::test]
async fn missing_playlist_aborts_before_any_segment() {
    init_tracing();
    let origin = Arc::new(Origin::default());
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let err = downloader(&out, 2)
        .run(&format!("{server}/missing.m3u8"))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::PlaylistFetch { .. }));
    assert!(err.is_fatal());
    assert!(out.is_dir());
    assert!(file_names(&out).is_empty());
    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_playlist_body_is_fatal() {
    let origin = Arc::new(Origin {
        playlist: "<html>gateway error</html>".to_string(),
        ..Default::default()
    });
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let err = downloader(dir.path(), 2)
        .run(&format!("{server}/live/index.m3u8"))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Playlist { .. }));
    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn in_flight_requests_never_exceed_limit() {
    init_tracing();
    let origin = media_origin(10, Duration::from_millis(50));
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let report = downloader(dir.path(), 3)
        .run(&format!("{server}/live/index.m3u8"))
        .await
        .unwrap();

    let DownloadReport::Media(summary) = report else {
        panic!("expected a media report");
    };
    assert_eq!(summary.downloaded, 10);
    let max = origin.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "observed {max} concurrent segment requests");
    assert!(max >= 1);
    assert_eq!(origin.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_callback_sees_monotonic_admissions() {
    let origin = media_origin(5, Duration::from_millis(10));
    let server = spawn_origin(origin).await;
    let dir = tempfile::tempdir().unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));

    downloader(dir.path(), 2)
        .with_progress(callback)
        .run(&format!("{server}/live/index.m3u8"))
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let admitted: Vec<(usize, usize, f64)> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Admitted {
                completed,
                total,
                accumulated_duration,
                ..
            } => Some((*completed, *total, *accumulated_duration)),
            ProgressEvent::Finished { .. } => None,
        })
        .collect();
    assert_eq!(
        admitted,
        [
            (1, 5, 1.0),
            (2, 5, 2.0),
            (3, 5, 3.0),
            (4, 5, 4.0),
            (5, 5, 5.0)
        ]
    );
}

#[tokio::test]
async fn segments_resolve_against_redirected_playlist_location() {
    init_tracing();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let recorded = hits.clone();
    let app = Router::new()
        .route(
            "/entry.m3u8",
            get(|| async { Redirect::temporary("/cdn/v1/stream.m3u8") }),
        )
        .route(
            "/cdn/v1/stream.m3u8",
            get(|| async {
                "#EXTM3U\n#EXT-X-TARGETDURATION:2\n#EXTINF:2.0,\nseg0.ts\n#EXTINF:2.0,\n../up.ts\n#EXT-X-ENDLIST\n"
            }),
        )
        .fallback(move |uri: Uri| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(uri.path().to_string());
                format!("payload of {}", uri.path())
            }
        });
    let server = spawn_app(app).await;
    let dir = tempfile::tempdir().unwrap();

    let report = downloader(dir.path(), 2)
        .run(&format!("{server}/entry.m3u8"))
        .await
        .unwrap();

    let DownloadReport::Media(summary) = report else {
        panic!("expected a media report");
    };
    assert_eq!(summary.downloaded, 2);
    let mut paths = hits.lock().unwrap().clone();
    paths.sort();
    assert_eq!(paths, ["/cdn/up.ts", "/cdn/v1/seg0.ts"]);
    assert_eq!(file_names(dir.path()), ["seg0.ts", "stream.m3u8", "up.ts"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("up.ts")).unwrap(),
        "payload of /cdn/up.ts"
    );
}

#[tokio::test]
async fn progress_lines_and_completion_are_logged() {
    let origin = Arc::new(Origin {
        playlist: MEDIA.to_string(),
        ..Default::default()
    });
    let server = spawn_origin(origin).await;
    let dir = tempfile::tempdir().unwrap();

    let (report, logs) =
        run_logged(downloader(dir.path(), 1), &format!("{server}/live/index.m3u8")).await;

    assert!(matches!(report, DownloadReport::Media(_)));
    for expected in [
        format!("going to download [1/3 (2s)] file: {server}/live/seg0.ts"),
        format!("going to download [2/3 (5.5s)] file: {server}/live/seg1.ts"),
        format!("going to download [3/3 (10s)] file: {server}/live/seg2.ts"),
        "m3u8 save as: index.m3u8".to_string(),
        "all download complete".to_string(),
    ] {
        assert!(logs.contains(&expected), "missing `{expected}` in:\n{logs}");
    }
    let first = logs.find("[1/3").unwrap();
    let last = logs.find("[3/3").unwrap();
    let done = logs.find("all download complete").unwrap();
    assert!(first < last && last < done);
}

#[tokio::test]
async fn completion_is_logged_when_every_segment_fails() {
    let origin = Arc::new(Origin {
        playlist: MEDIA.to_string(),
        fail_segments: true,
        ..Default::default()
    });
    let server = spawn_origin(origin.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let (report, logs) =
        run_logged(downloader(dir.path(), 2), &format!("{server}/live/index.m3u8")).await;

    let DownloadReport::Media(summary) = report else {
        panic!("expected a media report");
    };
    assert_eq!(summary.admitted, 3);
    assert_eq!(summary.failed, 3);
    assert_eq!(origin.segment_hits.load(Ordering::SeqCst), 3);
    assert!(logs.contains("going to download [3/3 (10s)]"), "{logs}");
    assert!(logs.contains("all download complete"), "{logs}");
    assert_eq!(file_names(dir.path()), ["index.m3u8"]);
}
