// Track fetcher: a small blocking HTTP client that downloads one track per
// call. The response body is streamed to disk in fixed-size chunks and a
// percentage is shown while it arrives.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, ORIGIN, RANGE, REFERER, USER_AGENT};
use reqwest::{StatusCode, Url};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Credentials, Settings};
use crate::error::{FetchError, FORBIDDEN_HINT};
use crate::interrupt::Interrupt;
use crate::ui::{fail, ok, Prompt};

pub const CHUNK_SIZE: usize = 8192;

const PLAYER_REFERER: &str = "https://player.fitradio.hu/";
const PLAYER_ORIGIN: &str = "https://player.fitradio.hu";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const PERCENT_TEMPLATE: &str = "Downloading: {percent}% [{bar:30}] {bytes}/{total_bytes}";
const SPINNER_TEMPLATE: &str = "{spinner} Downloading: {bytes}";

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Holds one reqwest blocking client, reused for every track so the
/// connection to the media host can be kept alive between downloads.
#[derive(Clone)]
pub struct TrackClient {
    client: Client,
    show_progress: bool,
    interrupt: Interrupt,
}

impl TrackClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(TrackClient {
            client,
            show_progress: settings.show_progress,
            interrupt: Interrupt::default(),
        })
    }

    /// Stop transfers when `interrupt` fires.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// The fixed header set sent with every track request.
    pub fn track_headers(creds: &Credentials) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", creds.bearer_token.trim()))
            .map_err(|_| FetchError::InvalidToken)?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(REFERER, HeaderValue::from_static(PLAYER_REFERER));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ORIGIN, HeaderValue::from_static(PLAYER_ORIGIN));
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-"));
        Ok(headers)
    }

    /// Download `url` into `output_dir`, named after the URL's last path
    /// segment. Only 200 and 206 count as success.
    pub fn fetch(
        &self,
        url: &str,
        creds: &Credentials,
        output_dir: &Path,
    ) -> Result<Download, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::EmptyUrl);
        }
        if !creds.is_complete() {
            return Err(FetchError::MissingCredentials);
        }
        let headers = Self::track_headers(creds)?;
        let file_name =
            file_name_from_url(url).ok_or_else(|| FetchError::NoFileName(url.to_string()))?;

        info!(%url, "requesting track");
        let response = self.client.get(url).headers(headers).send()?;
        let status = response.status();
        debug!(%status, content_length = ?response.content_length(), "response received");

        match status {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
            StatusCode::FORBIDDEN => return Err(FetchError::Forbidden),
            other => return Err(FetchError::Status(other.as_u16())),
        }

        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(&file_name);
        let bytes = self.write_body(response, &path)?;
        info!(path = %path.display(), bytes, "track saved");
        Ok(Download { path, bytes })
    }

    /// Same as [`fetch`](Self::fetch) but reports the outcome through the
    /// prompt instead of returning an error.
    pub fn download_track<P: Prompt + ?Sized>(
        &self,
        url: &str,
        creds: &Credentials,
        output_dir: &Path,
        prompt: &mut P,
    ) -> bool {
        match self.fetch(url, creds, output_dir) {
            Ok(download) => {
                let name = download
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                prompt.say(&ok(&format!("SUCCESS: {}", name)));
                true
            }
            // The command loop says goodbye.
            Err(FetchError::Interrupted) => {
                info!("download interrupted");
                false
            }
            Err(e) => {
                warn!(error = %e, "download failed");
                match e {
                    FetchError::Forbidden => {
                        prompt.say(&fail("FAILED: HTTP 403"));
                        prompt.say(&format!("   {}", FORBIDDEN_HINT));
                    }
                    FetchError::Status(code) => prompt.say(&fail(&format!("FAILED: HTTP {}", code))),
                    FetchError::EmptyUrl
                    | FetchError::MissingCredentials
                    | FetchError::InvalidToken
                    | FetchError::NoFileName(_)
                    | FetchError::Interrupted => prompt.say(&fail(&e.to_string())),
                    FetchError::Http(_) | FetchError::Io(_) => {
                        prompt.say(&fail(&format!("ERROR: {}", e)))
                    }
                }
                false
            }
        }
    }

    /// Stream the body into `<path>.part` and move it into place once the
    /// transfer is complete. The partial file is removed on error.
    fn write_body(&self, response: Response, path: &Path) -> Result<u64, FetchError> {
        let mut part = path.as_os_str().to_owned();
        part.push(".part");
        let part = PathBuf::from(part);

        let bar = self.progress_bar(response.content_length());
        self.interrupt.begin(&part);
        let result = stream_to_file(response, &part, &bar, &self.interrupt);
        let result = match result {
            Ok(bytes) => {
                bar.finish_and_clear();
                fs::rename(&part, path).map(|_| bytes).map_err(FetchError::from)
            }
            Err(e) => {
                bar.abandon();
                if let Err(rm) = fs::remove_file(&part) {
                    debug!(error = %rm, "could not remove partial file");
                }
                Err(e)
            }
        };
        self.interrupt.finish();
        result
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        let target = if self.show_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        // A missing or zero length means no percentage can be computed.
        match total.filter(|t| *t > 0) {
            Some(total) => {
                let bar = ProgressBar::with_draw_target(Some(total), target);
                if let Ok(style) = ProgressStyle::with_template(PERCENT_TEMPLATE) {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            None => {
                let bar = ProgressBar::with_draw_target(None, target);
                if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                    bar.set_style(style);
                }
                bar
            }
        }
    }
}

fn stream_to_file<R: Read>(
    mut body: R,
    path: &Path,
    bar: &ProgressBar,
    interrupt: &Interrupt,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        if interrupt.is_triggered() {
            return Err(FetchError::Interrupted);
        }
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;
        bar.set_position(written);
    }
    writer.flush()?;
    Ok(written)
}

/// Derive the output file name from a track URL: the last path segment
/// without query or fragment, percent-decoded.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)?,
        Err(_) => {
            let last = url.rsplit('/').next()?;
            last.split(['?', '#']).next()?.to_string()
        }
    };

    // Invalid UTF-8 after decoding becomes U+FFFD rather than failing.
    let bytes = urlencoding::decode_binary(segment.as_bytes());
    let decoded = String::from_utf8_lossy(&bytes).into_owned();
    let name = decoded.replace(['/', '\\'], "_");
    match name.trim() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}
