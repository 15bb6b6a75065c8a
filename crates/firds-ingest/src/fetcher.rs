//! HTTP resource fetcher
//!
//! Downloads a URL into a local directory. The saved file name comes from the
//! `Content-Disposition` header when the server sends one; XML responses are
//! decoded as UTF-8 text before writing and everything else is streamed to
//! disk unchanged.

use futures::StreamExt;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

const USER_AGENT: &str = concat!("firds-ingest/", env!("CARGO_PKG_VERSION"));

static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"filename=([^;]+)").expect("filename pattern is valid")
});

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to fetch {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("Response from {url} is not valid UTF-8: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A successful response whose body has not been read yet
#[derive(Debug)]
pub struct FetchedResource {
    url: String,
    response: Response,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl FetchedResource {
    fn new(url: &str, response: Response) -> Self {
        let headers = response.headers();
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_disposition);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            url: url.to_string(),
            response,
            file_name,
            content_type,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// File name suggested by the `Content-Disposition` header
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// `application/xml` or `text/xml`, parameters ignored
    pub fn is_xml(&self) -> bool {
        self.content_type.as_deref().is_some_and(|value| {
            let mime = value.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/xml") || mime.eq_ignore_ascii_case("text/xml")
        })
    }

    /// Write the body to `path`, returning the number of bytes written
    pub async fn save_to(self, path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| FetchError::io(path, e))?;

        let written = if self.is_xml() {
            let body = self.response.bytes().await.map_err(|source| FetchError::Connection {
                url: self.url.clone(),
                source,
            })?;
            let text = String::from_utf8(body.to_vec()).map_err(|source| FetchError::Decode {
                url: self.url.clone(),
                source,
            })?;
            file.write_all(text.as_bytes())
                .await
                .map_err(|e| FetchError::io(path, e))?;
            text.len() as u64
        } else {
            let mut downloaded = 0u64;
            let mut stream = self.response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|source| FetchError::Connection {
                    url: self.url.clone(),
                    source,
                })?;
                file.write_all(&chunk).await.map_err(|e| FetchError::io(path, e))?;
                downloaded += chunk.len() as u64;
            }
            downloaded
        };

        file.flush().await.map_err(|e| FetchError::io(path, e))?;
        Ok(written)
    }
}

/// Retrieves remote resources over HTTP(S)
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher; `None` means requests never time out
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Reuse an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issue a GET and check the status, leaving the body unread
    pub async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        debug!(url = %url, "Requesting resource");

        let response = self.client.get(url).send().await.map_err(|source| {
            error!(url = %url, error = %source, "Request failed");
            FetchError::Connection {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %url, status = %status, "Unexpected HTTP status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(FetchedResource::new(url, response))
    }

    /// Download `url` into `dest_dir` and return the saved path
    ///
    /// The file is named after the `Content-Disposition` header when present,
    /// otherwise `default_name`.
    pub async fn download(&self, url: &str, dest_dir: &Path, default_name: &str) -> Result<PathBuf> {
        let resource = self.fetch(url).await?;

        let file_name = resource.file_name().unwrap_or(default_name).to_string();
        let path = dest_dir.join(&file_name);
        debug!(
            url = %url,
            content_type = ?resource.content_type(),
            path = %path.display(),
            "Saving resource"
        );

        let bytes = resource.save_to(&path).await.inspect_err(|e| {
            error!(url = %url, path = %path.display(), error = %e, "Download failed");
        })?;

        info!(url = %url, path = %path.display(), bytes, "Downloaded resource");
        Ok(path)
    }
}

/// Extract the file name from a `Content-Disposition` value
///
/// Quotes are stripped and any directory components dropped, so a hostile
/// header cannot point outside the destination directory.
pub fn file_name_from_disposition(header: &str) -> Option<String> {
    let raw = FILENAME_PATTERN.captures(header)?.get(1)?.as_str();
    let unquoted = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let name = unquoted.rsplit(['/', '\\']).next()?.trim();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Last non-empty path segment of a URL
///
/// ```
/// use firds_ingest::fetcher::file_name_from_url;
///
/// assert_eq!(
///     file_name_from_url("http://example.org/files/DLTINS_X.zip").as_deref(),
///     Some("DLTINS_X.zip")
/// );
/// ```
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}
