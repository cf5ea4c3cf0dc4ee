//! Streaming `multipart/form-data` bodies.
//!
//! Text fields are buffered; file fields are read lazily while the body
//! is being sent, so large attachments never sit in memory.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

/// A multipart form with a fixed boundary.
#[derive(Debug)]
pub struct Form {
    boundary: String,
    parts: Vec<Part>,
}

/// One form field.
#[derive(Debug)]
enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        file: File,
        len: u64,
    },
}

impl Form {
    /// Creates an empty form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(gen_boundary())
    }

    /// Creates an empty form with the given boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Appends a text field.
    pub fn text(&mut self, name: &str, value: impl Into<String>) {
        self.parts.push(Part::Text {
            name: name.to_owned(),
            value: value.into(),
        });
    }

    /// Appends a file field streamed from `path`.
    ///
    /// The file is opened now; its length at this point is the length
    /// that will be sent.
    pub fn file(&mut self, name: &str, path: &Path) -> io::Result<()> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let file_name = path
            .file_name()
            .map_or_else(|| name.to_owned(), |n| n.to_string_lossy().into_owned());
        self.parts.push(Part::File {
            name: name.to_owned(),
            file_name,
            file,
            len,
        });
        Ok(())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Value of the `Content-Type` header for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact size of the encoded body in bytes.
    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|p| p.header(&self.boundary).len() as u64 + p.content_len() + 2)
            .sum();
        parts + self.closing().len() as u64
    }

    /// Consumes the form, returning a reader over the encoded body.
    pub fn into_reader(self) -> impl Read + Send {
        let closing = self.closing();
        let mut body: Box<dyn Read + Send> = Box::new(io::empty());
        for part in self.parts {
            let header = Cursor::new(part.header(&self.boundary).into_bytes());
            let content: Box<dyn Read + Send> = match part {
                Part::Text { value, .. } => Box::new(Cursor::new(value.into_bytes())),
                Part::File { file, len, .. } => Box::new(file.take(len)),
            };
            body = Box::new(body.chain(header).chain(content).chain(&b"\r\n"[..]));
        }
        body.chain(Cursor::new(closing.into_bytes()))
    }

    /// Final delimiter line.
    fn closing(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Part {
    /// Delimiter line plus part headers, ending with the blank line.
    fn header(&self, boundary: &str) -> String {
        match self {
            Self::Text { name, .. } => format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                quote(name)
            ),
            Self::File {
                name, file_name, ..
            } => format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                quote(name),
                quote(file_name)
            ),
        }
    }

    fn content_len(&self) -> u64 {
        match self {
            Self::Text { value, .. } => value.len() as u64,
            Self::File { len, .. } => *len,
        }
    }
}

/// Percent-encodes characters that would end a quoted header parameter.
fn quote(s: &str) -> String {
    s.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

/// Generates a boundary unlikely to occur inside the body.
fn gen_boundary() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut h = RandomState::new().build_hasher();
    h.write_u64(u64::from(std::process::id()));
    h.write_u128(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    );
    format!("------------------------satchel{:016x}", h.finish())
}
