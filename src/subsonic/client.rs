use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::audio::{StreamBody, StreamError};
use crate::config::ServerSettings;
use crate::orchestrator::{Announce, StreamProvider};
use crate::track::TrackDescriptor;

use super::error::ApiError;
use super::types::{AlbumPayload, Empty, Envelope, RandomSongsPayload};

/// Client for a Subsonic-compatible server (Navidrome, Gonic, ...).
///
/// API calls are async; the stream and notification entry points used by
/// the player are synchronous and drive the client's runtime themselves.
#[derive(Clone)]
pub struct SubsonicClient {
    http: Client,
    base: Url,
    username: String,
    password: String,
    client_name: String,
    api_version: String,
    request_timeout: Duration,
    stream_timeout: Duration,
    runtime: Handle,
}

impl SubsonicClient {
    pub fn new(server: &ServerSettings, stream_timeout: Duration, runtime: Handle) -> Result<Self, ApiError> {
        let trimmed = server.url.trim().trim_end_matches('/');
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ApiError::InvalidUrl(format!(
                "{:?} must start with http:// or https://",
                server.url
            )));
        }
        let base = Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        // No overall timeout here: it would also cut off long streams.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("{}/{}", server.client_name, env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            username: server.username.clone(),
            password: server.password.clone(),
            client_name: server.client_name.clone(),
            api_version: server.api_version.clone(),
            request_timeout: Duration::from_secs(server.request_timeout_secs),
            stream_timeout,
            runtime,
        })
    }

    /// `<base>/rest/<endpoint>.view?<params>&u=..&p=..&v=..&c=..&f=json`
    pub fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("rest")
            .push(&format!("{endpoint}.view"));

        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("u", &self.username)
            .append_pair("p", &self.password)
            .append_pair("v", &self.api_version)
            .append_pair("c", &self.client_name)
            .append_pair("f", "json");
        Ok(url)
    }

    /// Stream URL for a track; `format` asks the server to transcode.
    pub fn stream_url(&self, id: &str, format: Option<&str>) -> Result<Url, ApiError> {
        match format {
            Some(format) => self.endpoint_url("stream", &[("id", id), ("format", format)]),
            None => self.endpoint_url("stream", &[("id", id)]),
        }
    }

    pub async fn ping(&self) -> Result<(), ApiError> {
        let _: Empty = self.get("ping", &[]).await?;
        Ok(())
    }

    /// Tracks of an album, in album order.
    pub async fn get_album(&self, id: &str) -> Result<Vec<TrackDescriptor>, ApiError> {
        let payload: AlbumPayload = self.get("getAlbum", &[("id", id)]).await?;
        let album = payload
            .album
            .ok_or_else(|| ApiError::Malformed("getAlbum without an album".into()))?;
        debug!(album = %album.name, songs = album.song.len(), "fetched album");
        Ok(album.song.into_iter().map(TrackDescriptor::from).collect())
    }

    pub async fn get_random_songs(&self, size: usize) -> Result<Vec<TrackDescriptor>, ApiError> {
        let size = size.to_string();
        let payload: RandomSongsPayload = self.get("getRandomSongs", &[("size", &size)]).await?;
        Ok(payload
            .random_songs
            .song
            .into_iter()
            .map(TrackDescriptor::from)
            .collect())
    }

    /// `submission=false` marks the track as now playing; `true` records a play.
    pub async fn scrobble(&self, id: &str, submission: bool) -> Result<(), ApiError> {
        let submission = if submission { "true" } else { "false" };
        let _: Empty = self
            .get("scrobble", &[("id", id), ("submission", submission)])
            .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = self.endpoint_url(endpoint, params)?;
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse(&body)
    }

    fn announce(&self, id: &str, submission: bool) {
        let client = self.clone();
        let id = id.to_string();
        self.runtime.spawn(async move {
            if let Err(e) = client.scrobble(&id, submission).await {
                warn!(track = %id, submission, error = %e, "scrobble failed");
            }
        });
    }
}

/// Decode an envelope and unwrap its payload, turning `status: failed`
/// into [`ApiError::Server`].
pub(super) fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    let response = envelope.response;
    if response.status != "ok" {
        return Err(match response.error {
            Some(e) => ApiError::Server {
                code: e.code,
                message: e.message,
            },
            None => ApiError::Malformed(format!("status {:?} without an error", response.status)),
        });
    }
    Ok(response.payload)
}

impl StreamProvider for SubsonicClient {
    /// Blocks until the response headers arrive, bounded by the stream
    /// timeout; the same timeout bounds every later wait for body bytes.
    /// Must not be called from inside the runtime.
    fn open_stream(&self, track_id: &str, transcode: Option<&str>) -> Result<StreamBody, StreamError> {
        let url = self
            .stream_url(track_id, transcode)
            .map_err(|e| StreamError::Request(e.to_string()))?;
        debug!(track = %track_id, ?transcode, "opening stream");

        let request = self.http.get(url).send();
        let response = self
            .runtime
            .block_on(async { tokio::time::timeout(self.stream_timeout, request).await })
            .map_err(|_| StreamError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    StreamError::Timeout
                } else {
                    StreamError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status.as_u16()));
        }
        Ok(StreamBody::from_response(response, &self.runtime, self.stream_timeout))
    }
}

impl Announce for SubsonicClient {
    fn now_playing(&self, track_id: &str) {
        self.announce(track_id, false);
    }

    fn scrobble(&self, track_id: &str) {
        self.announce(track_id, true);
    }
}
