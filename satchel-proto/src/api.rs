//! Channels shared by the main and renderer endpoints.
//!
//! Both processes compile against these declarations, so a request type
//! can never disagree with the handler that decodes it. A name known to
//! only one side resolves to "no receiver" at call time.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Channel;
use crate::channel::names_unique;

/// Wire name of the bug-report submission channel.
pub const SUBMIT_BUG_REPORT_REQUEST_CHANNEL: &str = "SUBMIT_BUG_REPORT_REQUEST_CHANNEL";

/// Wire name of the system locale query channel.
pub const DETECT_SYSTEM_LOCALE_CHANNEL: &str = "DETECT_SYSTEM_LOCALE_CHANNEL";

/// Every channel name declared in this module.
pub const CHANNEL_NAMES: &[&str] = &[
    SUBMIT_BUG_REPORT_REQUEST_CHANNEL,
    DETECT_SYSTEM_LOCALE_CHANNEL,
];

const _: () = assert!(names_unique(CHANNEL_NAMES), "duplicate channel name");

/// Renderer asks main to upload a bug report; main replies once the
/// support backend has accepted it.
pub const SUBMIT_BUG_REPORT: Channel<SubmitBugReportRequest, ()> =
    Channel::new(SUBMIT_BUG_REPORT_REQUEST_CHANNEL);

/// Renderer asks main for the locale the UI should start in.
pub const DETECT_SYSTEM_LOCALE: Channel<(), String> = Channel::new(DETECT_SYSTEM_LOCALE_CHANNEL);

/// Request carried by [`SUBMIT_BUG_REPORT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBugReportRequest {
    /// Where to send the report.
    pub http_options: HttpOptions,
    /// What to send.
    pub request_payload: BugReportPayload,
}

/// Target of an outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOptions {
    /// `http` or `https`.
    pub scheme: Scheme,
    /// Host name or address of the support backend.
    pub hostname: String,
    /// TCP port.
    pub port: u16,
    /// Request path, starting with `/`.
    pub path: String,
    /// Request method.
    pub method: HttpMethod,
}

impl HttpOptions {
    /// Returns the absolute URL these options address.
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, self.hostname, self.port, self.path
        )
    }
}

/// URL scheme for [`HttpOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Https => "https",
        })
    }
}

/// Methods that carry a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    /// `POST`.
    Post,
    /// `PUT`.
    Put,
}

/// Bug report contents, sent to the backend as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugReportPayload {
    /// Product name and version, e.g. `Satchel 0.1.0`.
    pub product: String,
    /// Reporter's contact address.
    pub email: String,
    /// Short summary.
    pub subject: String,
    /// Full problem description.
    pub problem: String,
    /// Compressed logs to attach, if any.
    pub compressed_logs_file_path: Option<PathBuf>,
    /// Free-form environment facts (OS, network, versions).
    pub environment: BTreeMap<String, String>,
}
