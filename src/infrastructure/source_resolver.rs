use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::config::IngestConfig;
use crate::domain::error::Error;

/// Hosts whose links are sharing pages, not direct downloads. A URL on one
/// of these hosts must be rewritten before fetching; shapes we cannot
/// rewrite are rejected rather than fetched as-is.
const SHARE_HOSTS: [&str; 4] = [
    "drive.google.com",
    "docs.google.com",
    "www.dropbox.com",
    "dropbox.com",
];

/// The ingestion request as handed over by the routing layer. Exactly one of
/// `chunks` and `file_path` must be present.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub chunks: Option<Vec<Value>>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// The four ways chunks can reach the pipeline, resolved from an
/// `IngestRequest` before any work starts.
#[derive(Debug, Clone)]
pub enum IngestSource {
    Inline(Vec<Value>),
    LocalPath(PathBuf),
    RemoteUrl(Url),
    CloudShare(Url),
}

impl IngestRequest {
    /// Classifies the request into exactly one source variant.
    /// Both-present or neither-present is a `BadRequest`.
    pub fn classify(self) -> Result<IngestSource, Error> {
        match (self.chunks, self.file_path) {
            (Some(_), Some(_)) => Err(Error::BadRequest(
                "provide either inline chunks or a file path, not both".to_string(),
            )),
            (None, None) => Err(Error::BadRequest(
                "provide inline chunks or a file path".to_string(),
            )),
            (Some(chunks), None) => Ok(IngestSource::Inline(chunks)),
            (None, Some(path)) => {
                if path.starts_with("http://") || path.starts_with("https://") {
                    let url = Url::parse(&path)
                        .map_err(|e| Error::BadRequest(format!("invalid url '{}': {}", path, e)))?;
                    let host = url.host_str().unwrap_or_default();
                    if SHARE_HOSTS.contains(&host) {
                        Ok(IngestSource::CloudShare(url))
                    } else {
                        Ok(IngestSource::RemoteUrl(url))
                    }
                } else {
                    Ok(IngestSource::LocalPath(PathBuf::from(path)))
                }
            }
        }
    }
}

/// Turns an `IngestSource` into raw chunk records, handling download, the
/// temporary-file lifecycle and share-link rewriting.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    http: reqwest::Client,
}

impl SourceResolver {
    pub fn new(config: &IngestConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build http client: {}", e)))?;
        Ok(Self { http })
    }

    pub async fn resolve(&self, source: IngestSource) -> Result<Vec<Value>, Error> {
        match source {
            IngestSource::Inline(chunks) => Ok(chunks),
            IngestSource::LocalPath(path) => read_local(&path),
            IngestSource::RemoteUrl(url) => self.fetch(url).await,
            IngestSource::CloudShare(url) => {
                let direct = rewrite_share_url(&url)?;
                log::info!("Rewrote share link to direct download: {}", direct);
                self.fetch(direct).await
            }
        }
    }

    /// Downloads `url` into a scoped temporary file, then parses it. The
    /// temp file is owned by this call frame, so it is deleted on every exit
    /// path: success, parse failure and network failure alike.
    async fn fetch(&self, url: Url) -> Result<Vec<Value>, Error> {
        log::info!("Downloading chunk source from {}", url);

        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| Error::Fetch(format!("failed to create temp file: {}", e)))?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "request to {} returned status {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read body from {}: {}", url, e)))?;

        tmp.write_all(&body)
            .map_err(|e| Error::Fetch(format!("failed to write temp file: {}", e)))?;
        tmp.flush()
            .map_err(|e| Error::Fetch(format!("failed to flush temp file: {}", e)))?;

        let staged = std::fs::read(tmp.path())
            .map_err(|e| Error::Fetch(format!("failed to read temp file back: {}", e)))?;
        let records = parse_chunk_array(&staged)?;
        log::info!(
            "Downloaded {} chunk records ({} bytes) via {:?}",
            records.len(),
            staged.len(),
            tmp.path()
        );
        Ok(records)
    }
}

fn read_local(path: &PathBuf) -> Result<Vec<Value>, Error> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound(path.clone()));
        }
        Err(e) => {
            return Err(Error::Parse(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };
    parse_chunk_array(&bytes)
}

fn parse_chunk_array(bytes: &[u8]) -> Result<Vec<Value>, Error> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Parse(format!("source is not valid JSON: {}", e)))?;
    match value {
        Value::Array(records) => Ok(records),
        other => Err(Error::Parse(format!(
            "expected a JSON array of chunk records, got {}",
            match other {
                Value::Object(_) => "an object",
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                Value::Null => "null",
                Value::Array(_) => unreachable!(),
            }
        ))),
    }
}

/// Rewrites a known cloud-share link into a direct-download URL.
///
/// Supported shapes:
/// - Google Drive `/file/d/<id>/view?...` and `/open?id=<id>` become
///   `https://drive.google.com/uc?export=download&id=<id>`
/// - Dropbox links get `dl=1` forced into the query string
pub fn rewrite_share_url(url: &Url) -> Result<Url, Error> {
    let host = url.host_str().unwrap_or_default();

    if host == "drive.google.com" || host == "docs.google.com" {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        // /file/d/<id>/view?usp=sharing
        if segments.len() >= 3 && segments[0] == "file" && segments[1] == "d" {
            let id = segments[2];
            let direct = format!("https://drive.google.com/uc?export=download&id={}", id);
            return Url::parse(&direct).map_err(|e| Error::UnsupportedSource(e.to_string()));
        }
        // /open?id=<id>
        if segments.first() == Some(&"open") {
            if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "id") {
                let direct = format!("https://drive.google.com/uc?export=download&id={}", id);
                return Url::parse(&direct).map_err(|e| Error::UnsupportedSource(e.to_string()));
            }
        }
        // Already a direct-download form.
        if segments.first() == Some(&"uc") {
            return Ok(url.clone());
        }
        return Err(Error::UnsupportedSource(url.to_string()));
    }

    if host.ends_with("dropbox.com") {
        let mut direct = url.clone();
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "dl")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        direct
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("dl", "1");
        return Ok(direct);
    }

    Err(Error::UnsupportedSource(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver() -> SourceResolver {
        SourceResolver::new(&IngestConfig {
            fetch_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn classify_rejects_both_present() {
        let req = IngestRequest {
            chunks: Some(vec![json!({})]),
            file_path: Some("/tmp/chunks.json".to_string()),
        };
        assert!(matches!(req.classify(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn classify_rejects_neither_present() {
        let req = IngestRequest {
            chunks: None,
            file_path: None,
        };
        assert!(matches!(req.classify(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn classify_splits_local_remote_and_share() {
        let local = IngestRequest {
            chunks: None,
            file_path: Some("data/chunks.json".to_string()),
        };
        assert!(matches!(local.classify(), Ok(IngestSource::LocalPath(_))));

        let remote = IngestRequest {
            chunks: None,
            file_path: Some("https://example.org/chunks.json".to_string()),
        };
        assert!(matches!(remote.classify(), Ok(IngestSource::RemoteUrl(_))));

        let share = IngestRequest {
            chunks: None,
            file_path: Some(
                "https://drive.google.com/file/d/XYZ/view?usp=sharing".to_string(),
            ),
        };
        assert!(matches!(share.classify(), Ok(IngestSource::CloudShare(_))));
    }

    #[test]
    fn drive_view_link_rewrites_to_direct_download() {
        let url = Url::parse("https://drive.google.com/file/d/XYZ/view?usp=sharing").unwrap();
        let direct = rewrite_share_url(&url).unwrap();
        assert!(direct.as_str().contains("XYZ"));
        assert!(direct.as_str().contains("export=download"));
    }

    #[test]
    fn drive_open_link_rewrites_to_direct_download() {
        let url = Url::parse("https://drive.google.com/open?id=1ABC123").unwrap();
        let direct = rewrite_share_url(&url).unwrap();
        assert_eq!(
            direct.as_str(),
            "https://drive.google.com/uc?export=download&id=1ABC123"
        );
    }

    #[test]
    fn dropbox_link_forces_direct_download() {
        let url = Url::parse("https://www.dropbox.com/s/abc/chunks.json?dl=0").unwrap();
        let direct = rewrite_share_url(&url).unwrap();
        assert!(direct.query_pairs().any(|(k, v)| k == "dl" && v == "1"));
        assert!(!direct.query_pairs().any(|(k, v)| k == "dl" && v == "0"));
    }

    #[test]
    fn unknown_drive_shape_is_unsupported() {
        let url = Url::parse("https://drive.google.com/drive/folders/XYZ").unwrap();
        assert!(matches!(
            rewrite_share_url(&url),
            Err(Error::UnsupportedSource(_))
        ));
    }

    #[tokio::test]
    async fn resolve_inline_passes_records_through() {
        let records = vec![json!({"id": "c1"}), json!({"id": "c2"})];
        let out = resolver()
            .resolve(IngestSource::Inline(records.clone()))
            .await
            .unwrap();
        assert_eq!(out, records);
    }

    #[tokio::test]
    async fn resolve_local_missing_file_is_file_not_found() {
        let result = resolver()
            .resolve(IngestSource::LocalPath(PathBuf::from(
                "/definitely/not/here.json",
            )))
            .await;
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[tokio::test]
    async fn resolve_local_non_array_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{{\"not\": \"an array\"}}").unwrap();
        let result = resolver().resolve(IngestSource::LocalPath(path)).await;
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn resolve_local_reads_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "[{{\"id\": \"c1\"}}]").unwrap();
        let out = resolver()
            .resolve(IngestSource::LocalPath(path))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], "c1");
    }

    #[tokio::test]
    async fn resolve_remote_downloads_and_parses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chunks.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}, {"id": "c2"}])),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/chunks.json", server.uri())).unwrap();
        let out = resolver()
            .resolve(IngestSource::RemoteUrl(url))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn resolve_remote_non_2xx_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/gone.json", server.uri())).unwrap();
        let result = resolver().resolve(IngestSource::RemoteUrl(url)).await;
        assert!(matches!(result, Err(Error::Fetch(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn resolve_remote_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/bad.json", server.uri())).unwrap();
        let result = resolver().resolve(IngestSource::RemoteUrl(url)).await;
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
