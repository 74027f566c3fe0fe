use crate::error::{PipelineError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::sync::RwLock;
use std::time::Duration;

/// Where feature bytes come from. Implementations block; they run on
/// worker threads, never on the caller's task.
pub trait ByteSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Fetches `http(s)://` URLs over the network and memory-maps everything
/// else as a local path (with or without a `file://` prefix)
pub struct UrlSource {
    agent: ureq::Agent,
    max_bytes: u64,
}

/// Largest up-front reservation for a response body
const RESERVE_LIMIT: usize = 16 << 20;

pub const DEFAULT_MAX_FETCH_BYTES: u64 = 1 << 30;

impl UrlSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            max_bytes: DEFAULT_MAX_FETCH_BYTES,
        }
    }

    /// Refuse bodies and files larger than `max_bytes`
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, url: &str, len: u64) -> PipelineError {
        PipelineError::io(
            url,
            format!("{} bytes exceeds the {} byte fetch limit", len, self.max_bytes),
        )
    }

    fn fetch_remote(&self, url: &str) -> Result<Bytes> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                PipelineError::io(url, format!("server responded with status {}", code))
            }
            ureq::Error::Transport(transport) => PipelineError::io(url, transport),
        })?;

        let declared = response
            .header("Content-Length")
            .and_then(|len| len.parse::<u64>().ok());
        if let Some(len) = declared.filter(|&len| len > self.max_bytes) {
            return Err(self.too_large(url, len));
        }

        // Content-Length is untrusted; it only sizes the first allocation
        let reserve = declared
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0)
            .min(RESERVE_LIMIT);
        let mut body = Vec::with_capacity(reserve);
        response
            .into_reader()
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| PipelineError::io(url, e))?;
        if body.len() as u64 > self.max_bytes {
            return Err(self.too_large(url, body.len() as u64));
        }

        Ok(Bytes::from(body))
    }

    fn map_local(&self, url: &str) -> Result<Bytes> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let file = File::open(path).map_err(|e| PipelineError::io(url, e))?;
        let len = file.metadata().map_err(|e| PipelineError::io(url, e))?.len();
        if len == 0 {
            return Ok(Bytes::new());
        }
        if len > self.max_bytes {
            return Err(self.too_large(url, len));
        }

        // SAFETY: the map is read-only; feature files are not rewritten
        // while a dataset is open.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| PipelineError::io(url, e))?;
        Ok(Bytes::from_owner(map))
    }
}

impl Default for UrlSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ByteSource for UrlSource {
    fn fetch(&self, url: &str) -> Result<Bytes> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_remote(url)
        } else {
            self.map_local(url)
        }
    }
}

/// In-process byte store, handy for embedding pre-fetched files
#[derive(Default)]
pub struct MemorySource {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Bytes>) {
        self.files
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.into(), bytes.into());
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self, url: &str) -> Result<Bytes> {
        self.files
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::io(url, "no such file"))
    }
}
