use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;

use super::client::parse;
use super::types::{AlbumPayload, Empty, RandomSongsPayload};
use super::*;
use crate::audio::{Controller, ManualOutput, PlaybackPhase, PlayerError, StreamError};
use crate::config::ServerSettings;
use crate::orchestrator::StreamProvider;
use crate::track::TrackDescriptor;

fn settings(url: &str) -> ServerSettings {
    ServerSettings {
        url: url.into(),
        username: "alice".into(),
        password: "secret".into(),
        ..Default::default()
    }
}

fn client(rt: &Runtime, url: &str) -> SubsonicClient {
    client_with_timeout(rt, url, Duration::from_secs(5))
}

fn client_with_timeout(rt: &Runtime, url: &str, stream_timeout: Duration) -> SubsonicClient {
    SubsonicClient::new(&settings(url), stream_timeout, rt.handle().clone()).unwrap()
}

/// Serve one canned HTTP response on a local port, then keep the socket
/// open until `release` fires (or a few seconds pass).
fn serve_once(response: Vec<u8>) -> (String, mpsc::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(&response).unwrap();
        socket.flush().unwrap();
        let _ = release_rx.recv_timeout(Duration::from_secs(10));
    });

    (format!("http://{addr}"), release_tx)
}

fn http_response(status: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

#[test]
fn stream_url_carries_auth_and_transcode() {
    let rt = Runtime::new().unwrap();
    let client = client(&rt, "http://music.local/navidrome/");

    let url = client.stream_url("42", Some("mp3")).unwrap();
    assert_eq!(url.path(), "/navidrome/rest/stream.view");

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let get = |k: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == k)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(get("id"), Some("42"));
    assert_eq!(get("format"), Some("mp3"));
    assert_eq!(get("u"), Some("alice"));
    assert_eq!(get("p"), Some("secret"));
    assert_eq!(get("v"), Some("1.16.1"));
    assert_eq!(get("c"), Some("subtune"));
    assert_eq!(get("f"), Some("json"));

    let raw = client.stream_url("42", None).unwrap();
    assert!(raw.query_pairs().all(|(k, _)| k != "format"));
}

#[test]
fn rejects_urls_without_a_scheme() {
    let rt = Runtime::new().unwrap();
    let result = SubsonicClient::new(
        &settings("music.local"),
        Duration::from_secs(5),
        rt.handle().clone(),
    );
    assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
}

#[test]
fn album_songs_become_track_descriptors() {
    let body = br#"{"subsonic-response": {
        "status": "ok", "version": "1.16.1",
        "album": {
            "id": "al-1", "name": "Geogaddi", "artist": "Boards of Canada", "year": 2002,
            "song": [
                {"id": "s1", "title": "Ready Lets Go", "album": "Geogaddi",
                 "artist": "Boards of Canada", "albumId": "al-1", "year": 2002,
                 "duration": 60, "suffix": "FLAC", "bitRate": 900},
                {"id": "s2", "title": "Music Is Math", "duration": 321, "suffix": "m4a"}
            ]
        }
    }}"#;

    let payload: AlbumPayload = parse(body).unwrap();
    let tracks: Vec<TrackDescriptor> = payload
        .album
        .unwrap()
        .song
        .into_iter()
        .map(TrackDescriptor::from)
        .collect();

    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].id, "s1");
    assert_eq!(tracks[0].album_id, "al-1");
    assert_eq!(tracks[0].year, Some(2002));
    assert_eq!(tracks[0].duration_ms, 60_000);
    assert_eq!(tracks[0].format, "flac");
    assert_eq!(tracks[1].year, None);
    assert_eq!(tracks[1].format, "m4a");
}

#[test]
fn failed_status_is_a_server_error() {
    let body = br#"{"subsonic-response": {"status": "failed", "version": "1.16.1",
        "error": {"code": 40, "message": "Wrong username or password"}}}"#;

    match parse::<Empty>(body) {
        Err(ApiError::Server { code, message }) => {
            assert_eq!(code, 40);
            assert_eq!(message, "Wrong username or password");
        }
        other => panic!("expected a server error, got {other:?}"),
    }
}

#[test]
fn random_songs_tolerate_an_empty_library() {
    let body = br#"{"subsonic-response": {"status": "ok", "randomSongs": {}}}"#;
    let payload: RandomSongsPayload = parse(body).unwrap();
    assert!(payload.random_songs.song.is_empty());

    assert!(matches!(parse::<Empty>(b"<html>"), Err(ApiError::Json(_))));
}

#[test]
fn get_album_goes_over_http() {
    let rt = Runtime::new().unwrap();
    let body = br#"{"subsonic-response": {"status": "ok", "album": {"id": "a", "name": "A",
        "song": [{"id": "1", "title": "One", "duration": 3, "suffix": "mp3"}]}}}"#;
    let (url, _release) = serve_once(http_response("200 OK", body));
    let client = client(&rt, &url);

    let tracks = rt.block_on(client.get_album("a")).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].title, "One");
    assert_eq!(tracks[0].duration_ms, 3000);
}

#[test]
fn http_error_status_fails_the_stream_open() {
    let rt = Runtime::new().unwrap();
    let (url, _release) = serve_once(http_response("404 Not Found", b"gone"));
    let client = client(&rt, &url);

    match client.open_stream("1", None) {
        Err(e) => assert_eq!(e, StreamError::Status(404)),
        Ok(_) => panic!("expected the open to fail"),
    }
}

#[test]
fn stream_body_delivers_the_response_bytes() {
    let rt = Runtime::new().unwrap();
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let (url, _release) = serve_once(http_response("200 OK", &payload));
    let client = client(&rt, &url);

    let body = client.open_stream("1", None).unwrap();
    let (mut reader, _handle) = body.into_parts();
    let mut received = Vec::new();
    reader.read_to_end(&mut received).unwrap();
    assert_eq!(received, payload);
}

#[test]
fn closing_the_body_releases_a_blocked_read() {
    let rt = Runtime::new().unwrap();
    // Promise more than we send so the reader blocks waiting for the rest.
    let mut response = b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\n".to_vec();
    response.extend_from_slice(&[7u8; 1000]);
    let (url, release) = serve_once(response);
    let client = client(&rt, &url);

    let body = client.open_stream("1", None).unwrap();
    let (mut reader, handle) = body.into_parts();
    let mut first = vec![0u8; 1000];
    reader.read_exact(&mut first).unwrap();

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.close();
    });

    let started = Instant::now();
    let mut rest = [0u8; 64];
    assert_eq!(reader.read(&mut rest).unwrap(), 0);
    assert!(started.elapsed() < Duration::from_secs(5));

    closer.join().unwrap();
    let _ = release.send(());
}

/// Headers arrive, then the server goes quiet without sending a byte.
fn silent_after_headers() -> Vec<u8> {
    b"HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: 500000\r\n\r\n".to_vec()
}

#[test]
fn silent_body_read_times_out() {
    let rt = Runtime::new().unwrap();
    let (url, release) = serve_once(silent_after_headers());
    let client = client_with_timeout(&rt, &url, Duration::from_millis(200));

    let body = client.open_stream("1", None).unwrap();
    let (mut reader, _handle) = body.into_parts();

    let started = Instant::now();
    let mut buf = [0u8; 64];
    let err = reader.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));

    let _ = release.send(());
}

#[test]
fn play_gives_up_on_a_stream_that_never_sends_audio() {
    let rt = Runtime::new().unwrap();
    let (url, release) = serve_once(silent_after_headers());
    let client = client_with_timeout(&rt, &url, Duration::from_millis(200));
    let mut controller = Controller::new(ManualOutput::new(44_100), "mp3");

    let source = || client.open_stream("1", None);
    let started = Instant::now();
    let err = controller
        .play(&source, "mp3", TrackDescriptor::default())
        .unwrap_err();

    assert_eq!(err, PlayerError::Connect(StreamError::Timeout));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(controller.phase(), PlaybackPhase::Idle);
    assert!(controller.current().is_none());

    let _ = release.send(());
}
