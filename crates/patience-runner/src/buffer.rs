//! A fixed-capacity byte sink: writes past the
//! cap are silently dropped, with no allocation growth beyond it.

/// Default per-stream capture cap.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct BoundedBuffer {
    data: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl BoundedBuffer {
    pub(crate) fn new(cap: usize) -> Self {
        Self { data: Vec::new(), cap, truncated: false }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        let remaining = self.cap.saturating_sub(self.data.len());
        if chunk.len() > remaining {
            self.data.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        } else {
            self.data.extend_from_slice(chunk);
        }
    }

    pub(crate) fn into_parts(self) -> (String, bool) {
        (String::from_utf8_lossy(&self.data).into_owned(), self.truncated)
    }
}
