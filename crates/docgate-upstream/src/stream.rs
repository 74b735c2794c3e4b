use std::collections::VecDeque;
use std::fmt::Display;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use tracing::warn;

use crate::describe_transport_error;

/// Cap on buffered bytes of a line whose newline has not arrived yet. Past it
/// the pending bytes are emitted as a line of their own.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Lazy, single-pass sequence of text lines read from an open upstream
/// response. Once the body ends (or the connection fails) the sequence is
/// exhausted for good; further reads return `None`.
pub struct LineStream {
    status: StatusCode,
    inner: Option<BoxStream<'static, Result<Vec<u8>, String>>>,
    buffer: Vec<u8>,
    scanned: usize,
    max_line_bytes: usize,
    ready: VecDeque<String>,
}

impl std::fmt::Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("status", &self.status)
            .field("open", &self.inner.is_some())
            .field("buffered_lines", &self.ready.len())
            .finish()
    }
}

impl LineStream {
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|error| describe_transport_error(&error)));
        Self::from_chunks(status, chunks)
    }

    /// Builds a line stream over any chunked byte source.
    pub fn from_chunks<S, B, E>(status: StatusCode, chunks: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]>,
        E: Display,
    {
        let inner = chunks
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.as_ref().to_vec())
                    .map_err(|error| error.to_string())
            })
            .boxed();
        Self {
            status,
            inner: Some(inner),
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes: MAX_LINE_BYTES,
            ready: VecDeque::new(),
        }
    }

    /// Lowers or raises the per-line cap. Zero is treated as one byte.
    #[must_use]
    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit.max(1);
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.inner.is_none() && self.ready.is_empty()
    }

    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(line);
            }
            let inner = self.inner.as_mut()?;
            match inner.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.split_complete_lines();
                }
                Some(Err(error)) => {
                    warn!(error = %error, "upstream line stream interrupted");
                    self.finish();
                }
                None => self.finish(),
            }
        }
    }

    /// Drains the remaining lines into a `Stream`, e.g. for a response body.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self, |mut lines| async move {
            lines.next_line().await.map(|line| (line, lines))
        })
    }

    /// Only bytes appended since the last call are searched for newlines.
    fn split_complete_lines(&mut self) {
        let mut line_start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buffer[cursor..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let newline = cursor + offset;
            self.ready
                .push_back(decode_line(&self.buffer[line_start..newline]));
            line_start = newline + 1;
            cursor = line_start;
        }
        self.buffer.drain(..line_start);

        while self.buffer.len() > self.max_line_bytes {
            let rest = self.buffer.split_off(self.max_line_bytes);
            let piece = std::mem::replace(&mut self.buffer, rest);
            self.ready.push_back(String::from_utf8_lossy(&piece).to_string());
        }
        self.scanned = self.buffer.len();
    }

    fn finish(&mut self) {
        self.inner = None;
        self.scanned = 0;
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.ready.push_back(decode_line(&rest));
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).to_string()
}
