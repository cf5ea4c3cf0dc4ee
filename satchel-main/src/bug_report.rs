//! Bug-report submission: proxies a report and its log archive to the
//! support backend.
//!
//! Only the main process may talk to the backend, so the renderer hands
//! the report over [`api::SUBMIT_BUG_REPORT`](satchel::api::SUBMIT_BUG_REPORT)
//! and this handler performs the upload. Each request is attempted exactly
//! once; the first failure is returned to the caller.

use std::fmt;
use std::io;
use std::path::PathBuf;

use satchel::api::{BugReportPayload, HttpMethod, SubmitBugReportRequest};
use tracing::info;
use ureq::{Agent, SendBody};

use crate::multipart::Form;

/// Name of the multipart field holding the JSON payload.
const PAYLOAD_FIELD: &str = "payload";

/// Errors from a bug-report upload.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The backend answered with a status other than 200.
    #[error("support backend answered HTTP {0}")]
    Status(u16),

    /// The request could not be sent (DNS, connect, TLS, write).
    #[error("request failed: {0}")]
    Connect(String),

    /// The response body failed mid-stream.
    #[error("reading response body: {0}")]
    Body(#[source] io::Error),

    /// The log archive could not be opened.
    #[error("cannot attach {}: {source}", path.display())]
    Attachment {
        /// The archive path from the payload.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The payload could not be serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The upload task was cancelled before it finished.
    #[error("upload cancelled")]
    Cancelled,
}

/// Sends bug reports over HTTP(S).
#[derive(Clone)]
pub struct Uploader {
    agent: Agent,
}

impl Uploader {
    /// Creates an uploader that honors the proxy environment variables.
    pub fn new() -> Self {
        Self {
            agent: Agent::new_with_config(
                Agent::config_builder().http_status_as_error(false).build(),
            ),
        }
    }

    /// Creates an uploader that always connects directly.
    pub fn direct() -> Self {
        Self {
            agent: Agent::new_with_config(
                Agent::config_builder()
                    .http_status_as_error(false)
                    .proxy(None)
                    .build(),
            ),
        }
    }

    /// Uploads `request` on the blocking pool.
    pub async fn upload(&self, request: SubmitBugReportRequest) -> Result<(), UploadError> {
        info!(?request, "bug report request received");
        let this = self.clone();
        match tokio::task::spawn_blocking(move || this.upload_blocking(&request)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(UploadError::Cancelled),
        }
    }

    /// Uploads `request`, blocking the calling thread.
    pub fn upload_blocking(&self, request: &SubmitBugReportRequest) -> Result<(), UploadError> {
        let form = build_form(&request.request_payload)?;
        let options = &request.http_options;
        let url = options.url();
        let content_type = form.content_type();
        let content_length = form.content_length().to_string();
        info!(
            %url,
            method = ?options.method,
            %content_type,
            %content_length,
            "sending bug report request"
        );

        let builder = match options.method {
            HttpMethod::Post => self.agent.post(&url),
            HttpMethod::Put => self.agent.put(&url),
        };
        let mut body = form.into_reader();
        let resp = builder
            .header("Content-Type", &content_type)
            .header("Content-Length", &content_length)
            .send(SendBody::from_reader(&mut body))
            .map_err(|e| UploadError::Connect(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(UploadError::Status(status));
        }
        io::copy(&mut resp.into_body().into_reader(), &mut io::sink()).map_err(UploadError::Body)?;
        Ok(())
    }
}

impl Default for Uploader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uploader").finish_non_exhaustive()
    }
}

/// Builds the form: the JSON payload, plus the log archive when present.
fn build_form(payload: &BugReportPayload) -> Result<Form, UploadError> {
    let mut form = Form::new();
    form.text(PAYLOAD_FIELD, serde_json::to_string(payload)?);

    if let Some(path) = &payload.compressed_logs_file_path {
        let attach = |source| UploadError::Attachment {
            path: path.clone(),
            source,
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                attach(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path has no file name",
                ))
            })?;
        form.file(&name, path).map_err(attach)?;
    }
    Ok(form)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use satchel::api::{HttpOptions, Scheme};

    use super::*;

    /// Accepts one HTTP request, answers with `status`, and returns the raw
    /// request text.
    pub(crate) fn serve_once(status: u16) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            write!(
                stream,
                "HTTP/1.1 {status} Status\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
            )
            .unwrap();
            request
        });
        (port, handle)
    }

    /// Reads headers and a `Content-Length` or chunked body.
    fn read_request(stream: &mut impl Read) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let length = text[..head_end].lines().find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            });
            let done = match length {
                Some(len) => buf.len() >= head_end + 4 + len,
                None => text.ends_with("0\r\n\r\n"),
            };
            if done {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub(crate) fn request(port: u16, logs: Option<PathBuf>) -> SubmitBugReportRequest {
        SubmitBugReportRequest {
            http_options: HttpOptions {
                scheme: Scheme::Http,
                hostname: "127.0.0.1".into(),
                port,
                path: "/api/bug-report".into(),
                method: HttpMethod::Post,
            },
            request_payload: BugReportPayload {
                product: "Satchel 0.1.0".into(),
                email: "user@example.org".into(),
                subject: "Sync stalls".into(),
                problem: "Stuck at 99%".into(),
                compressed_logs_file_path: logs,
                environment: [("os".to_owned(), "linux".to_owned())].into(),
            },
        }
    }

    fn field_count(raw: &str) -> usize {
        raw.matches("Content-Disposition: form-data;").count()
    }

    #[test]
    fn report_without_logs_sends_only_the_payload_field() {
        let (port, server) = serve_once(200);
        Uploader::direct()
            .upload_blocking(&request(port, None))
            .unwrap();

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /api/bug-report "));
        assert!(raw.to_ascii_lowercase().contains("content-type: multipart/form-data; boundary="));
        assert_eq!(field_count(&raw), 1);
        assert!(raw.contains("name=\"payload\"\r\n\r\n{\"product\":\"Satchel 0.1.0\""));
        assert!(raw.contains("\"compressedLogsFilePath\":null"));
        assert!(!raw.contains("filename="));
    }

    #[test]
    fn report_with_logs_attaches_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs-2026.zip");
        std::fs::write(&logs, b"zipped log lines").unwrap();

        let (port, server) = serve_once(200);
        Uploader::direct()
            .upload_blocking(&request(port, Some(logs)))
            .unwrap();

        let raw = server.join().unwrap();
        assert_eq!(field_count(&raw), 2);
        assert!(raw.contains("name=\"logs-2026.zip\"; filename=\"logs-2026.zip\""));
        assert!(raw.contains("zipped log lines"));
    }

    #[test]
    fn non_200_status_rejects() {
        for status in [500, 503, 201] {
            let (port, server) = serve_once(status);
            let err = Uploader::direct()
                .upload_blocking(&request(port, None))
                .unwrap_err();
            assert!(matches!(err, UploadError::Status(s) if s == status));
            server.join().unwrap();
        }
    }

    #[test]
    fn connection_refused_rejects() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Uploader::direct()
            .upload_blocking(&request(port, None))
            .unwrap_err();
        assert!(matches!(err, UploadError::Connect(_)));
    }

    #[test]
    fn unreadable_archive_rejects_before_connecting() {
        // Port 9 (discard) is never contacted: the form fails first.
        let missing = PathBuf::from("/nonexistent/satchel/logs.zip");
        let err = Uploader::direct()
            .upload_blocking(&request(9, Some(missing.clone())))
            .unwrap_err();
        match err {
            UploadError::Attachment { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Attachment, got {other:?}"),
        }
    }
}
