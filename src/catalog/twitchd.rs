use crossbeam_channel::{unbounded, Receiver, Sender};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CatalogError, CatalogResponse, StreamCatalog, StreamIndex};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the local twitchd daemon.
///
/// `/stream_index?channel=` lists qualities, `/play?channel=&quality=` serves
/// the media stream itself.
pub struct TwitchdClient {
    endpoint: Url,
    http: Client,
    response_sender: Sender<CatalogResponse>,
    response_receiver: Receiver<CatalogResponse>,
    wake: Option<egui::Context>,
}

impl TwitchdClient {
    pub fn new(endpoint: Url) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let (response_sender, response_receiver) = unbounded();

        Ok(Self {
            endpoint,
            http,
            response_sender,
            response_receiver,
            wake: None,
        })
    }

    /// Repaint `ctx` whenever a response arrives.
    pub fn with_wake(mut self, ctx: egui::Context) -> Self {
        self.wake = Some(ctx);
        self
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(path);
        url.query_pairs_mut().clear().extend_pairs(params);
        url
    }

    fn index_url(&self, channel: &str) -> Url {
        self.url("/stream_index", &[("channel", channel)])
    }
}

fn fetch_index(http: &Client, url: Url, channel: &str) -> Result<StreamIndex, CatalogError> {
    let response = http.get(url).send()?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(CatalogError::NotFound(channel.to_owned()));
    }
    Ok(response.error_for_status()?.json()?)
}

impl StreamCatalog for TwitchdClient {
    fn request_qualities(&mut self, channel: &str) {
        let url = self.index_url(channel);
        let http = self.http.clone();
        let sender = self.response_sender.clone();
        let wake = self.wake.clone();
        let channel = channel.to_owned();

        debug!(%url, "requesting stream index");
        thread::spawn(move || {
            let result = fetch_index(&http, url, &channel);
            if let Err(e) = &result {
                warn!(channel = %channel, "stream index request failed: {}", e);
            }
            if sender.send(CatalogResponse { channel, result }).is_ok() {
                if let Some(ctx) = wake {
                    ctx.request_repaint();
                }
            }
        });
    }

    fn try_next_response(&mut self) -> Option<CatalogResponse> {
        self.response_receiver.try_recv().ok()
    }

    fn playback_url(&self, channel: &str, quality: &str) -> String {
        let url = if quality.is_empty() {
            self.url("/play", &[("channel", channel)])
        } else {
            self.url("/play", &[("channel", channel), ("quality", quality)])
        };
        url.into()
    }
}
