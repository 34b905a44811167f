// Source descriptors and declared media format

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where encoded audio comes from
#[derive(Clone)]
pub enum DataSource {
    /// Local file path
    Path(PathBuf),
    /// Remote `http(s)://` URL
    Url(String),
    /// Embedded resource: an in-memory image of an encoded file.
    /// `name` is only used for format hints and logs.
    Resource { name: String, bytes: Arc<[u8]> },
}

impl DataSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DataSource::Path(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        DataSource::Url(url.into())
    }

    pub fn resource(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        DataSource::Resource {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Parse a command-line style source: URLs by scheme, everything else as a path.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            DataSource::Url(input.to_string())
        } else {
            DataSource::Path(PathBuf::from(input))
        }
    }

    /// File extension usable as a container hint, lowercased.
    pub fn extension_hint(&self) -> Option<String> {
        let name = match self {
            DataSource::Path(path) => return extension_of(path),
            DataSource::Url(url) => url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .rsplit('/')
                .next()
                .unwrap_or_default(),
            DataSource::Resource { name, .. } => name.as_str(),
        };
        extension_of(Path::new(name))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DataSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            DataSource::Resource { name, bytes } => f
                .debug_struct("Resource")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataSource::Path(path) => write!(f, "file {}", path.display()),
            DataSource::Url(url) => write!(f, "url {}", url),
            DataSource::Resource { name, bytes } => {
                write!(f, "resource {} ({} bytes)", name, bytes.len())
            }
        }
    }
}

/// Declared format of the playing track, fixed for the session once opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub mime: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
    /// Duration in microseconds, 0 when unknown (live stream)
    pub duration_us: u64,
}

impl MediaDescriptor {
    pub fn is_live(&self) -> bool {
        self.duration_us == 0
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_us / 1000
    }
}
