use futures_util::stream::{self, Stream, StreamExt};

use super::{ChatDelta, ChatStream, ProviderError};

/// Carries partial lines between network chunks.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed, newline included.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(i) => {
                let complete: Vec<u8> = self.pending.drain(..=i).collect();
                String::from_utf8_lossy(&complete).into_owned()
            }
            None => String::new(),
        }
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Turn a line-oriented response body (SSE, NDJSON) into text deltas.
///
/// `parse` only ever sees complete lines, plus the unterminated tail once the
/// body is exhausted.
pub(crate) fn line_deltas<S, B>(body: S, parse: fn(&str) -> Result<String, ProviderError>) -> ChatStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = Some((body.boxed(), LineBuffer::default()));
    stream::unfold(state, move |state| async move {
        let (mut body, mut buf) = match state {
            Some(s) => s,
            None => return None,
        };
        match body.next().await {
            Some(Ok(chunk)) => {
                let text = buf.push(chunk.as_ref());
                Some((parse(&text), Some((body, buf))))
            }
            Some(Err(e)) => Some((Err(ProviderError::Http(e)), Some((body, buf)))),
            None => {
                let rest = buf.finish();
                if rest.trim().is_empty() {
                    None
                } else {
                    Some((parse(&rest), None))
                }
            }
        }
    })
    .map(|res| {
        res.map(|text| ChatDelta {
            delta: if text.is_empty() { None } else { Some(text) },
        })
    })
    .filter(|res| {
        futures_util::future::ready(match res {
            Ok(d) => d.delta.is_some(),
            Err(_) => true,
        })
    })
    .boxed()
}
