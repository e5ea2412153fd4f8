//! Token stream plumbing shared by the providers.
//!
//! Providers hand back a [`TokenStream`]; callers drain it with
//! [`accumulate`] and only then look at the text.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use super::AIError;

/// Stream of text tokens in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AIError>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>;

/// What a provider's line decoder made of one line of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decoded {
    Token(String),
    Skip,
    Done,
}

/// Drain a token stream into one string.
///
/// An error part-way through ends the stream early; whatever arrived before
/// the error is returned as the response.
pub async fn accumulate(mut stream: TokenStream) -> String {
    let mut text = String::new();
    let mut tokens = 0usize;

    while let Some(item) = stream.next().await {
        match item {
            Ok(token) => {
                text.push_str(&token);
                tokens += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, received = text.len(), "Stream interrupted, using partial response");
                break;
            }
        }
    }

    tracing::debug!(tokens, bytes = text.len(), "Stream drained");
    text
}

/// Build a token stream from already-known tokens.
pub fn from_tokens<I>(tokens: I) -> TokenStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(tokens.into_iter().map(Ok)))
}

/// Split a response body into lines and decode each line into tokens.
pub(crate) fn decode_lines<S, B, E>(body: S, decode: fn(&str) -> Decoded) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + 'static,
    E: Display + 'static,
{
    let body: ByteStream =
        Box::pin(body.map(|chunk| chunk.map(|b| b.as_ref().to_vec()).map_err(|e| e.to_string())));

    let state = LineState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        decode,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.pending.pop_front() {
                return Some((Ok(token), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.feed(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(AIError::Stream(e)), state));
                }
                None => {
                    state.flush();
                    state.finished = true;
                }
            }
        }
    }))
}

struct LineState {
    body: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    decode: fn(&str) -> Decoded,
    finished: bool,
}

impl LineState {
    fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.handle_line(&line);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
    }

    /// Decode a final line that had no trailing newline.
    fn flush(&mut self) {
        if !self.finished && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match (self.decode)(line) {
            Decoded::Token(token) => self.pending.push_back(token),
            Decoded::Skip => {}
            Decoded::Done => self.finished = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(line: &str) -> Decoded {
        match line {
            "END" => Decoded::Done,
            "#" => Decoded::Skip,
            other => Decoded::Token(other.to_string()),
        }
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_accumulate_concatenates_in_order() {
        let stream = from_tokens(vec!["<h1>".to_string(), "Hi".to_string(), "</h1>".to_string()]);
        assert_eq!(accumulate(stream).await, "<h1>Hi</h1>");
    }

    #[tokio::test]
    async fn test_accumulate_keeps_partial_text_on_error() {
        let items = vec![
            Ok("partial ".to_string()),
            Ok("text".to_string()),
            Err(AIError::Stream("connection reset".to_string())),
            Ok("never seen".to_string()),
        ];
        let stream: TokenStream = Box::pin(stream::iter(items));
        assert_eq!(accumulate(stream).await, "partial text");
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let body = chunks(&["he", "llo\nwor", "ld\n"]);
        let tokens: Vec<_> = decode_lines(body, echo).collect().await;
        let tokens: Vec<String> = tokens.into_iter().map(Result::unwrap).collect();
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_done_line_stops_decoding() {
        let body = chunks(&["a\n#\nEND\nb\n"]);
        let text = accumulate(decode_lines(body, echo)).await;
        assert_eq!(text, "a");
    }

    #[tokio::test]
    async fn test_final_line_without_newline_is_flushed() {
        let body = chunks(&["first\n", "last"]);
        let text = accumulate(decode_lines(body, echo)).await;
        assert_eq!(text, "firstlast");
    }

    #[tokio::test]
    async fn test_body_error_surfaces_after_received_tokens() {
        let items: Vec<Result<Vec<u8>, String>> =
            vec![Ok(b"one\n".to_vec()), Err("socket closed".to_string())];
        let mut tokens = decode_lines(stream::iter(items), echo);

        assert_eq!(tokens.next().await.unwrap().unwrap(), "one");
        assert!(matches!(tokens.next().await, Some(Err(AIError::Stream(_)))));
        assert!(tokens.next().await.is_none());
    }
}
