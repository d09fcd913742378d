use bytes::Bytes;
use engine_logging::{engine_debug, engine_info};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tubechat_core::{ChatRequest, EventStreamDecoder, StreamEvent};

use crate::{ApiClient, ApiError, RelayError, StreamEnd};

/// Receives the incremental events of one chat stream.
pub trait StreamSink: Send + Sync {
    /// The server accepted the request and the body is about to be read.
    fn opened(&self) {}

    /// Called once per `text` / `sources` event, as soon as its line is complete.
    fn emit(&self, event: StreamEvent);
}

/// Sends `request` and relays the resulting event stream into `sink`.
///
/// `done` and `error` events end the relay and are reported through the
/// return value rather than the sink.
pub async fn relay_chat(
    client: &ApiClient,
    request: &ChatRequest,
    sink: &dyn StreamSink,
    cancel: &CancellationToken,
) -> Result<StreamEnd, RelayError> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(RelayError::Cancelled),
        response = client.open_chat_stream(request) => response?,
    };
    sink.opened();
    consume_event_stream(response.bytes_stream(), sink, cancel).await
}

/// Decodes a chunked event stream until `done`, `error`, cancellation or end of input.
pub async fn consume_event_stream<S, E>(
    stream: S,
    sink: &dyn StreamSink,
    cancel: &CancellationToken,
) -> Result<StreamEnd, RelayError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<ApiError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = EventStreamDecoder::new();
    let mut chunks = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                engine_info!("Chat stream cancelled after {} chunks", chunks);
                return Err(RelayError::Cancelled);
            }
            next = stream.next() => next,
        };

        let (events, finished) = match next {
            Some(Ok(chunk)) => {
                chunks += 1;
                engine_debug!("Chat stream chunk {} ({} bytes)", chunks, chunk.len());
                (decoder.push(&chunk), false)
            }
            Some(Err(err)) => return Err(RelayError::Api(err.into())),
            None => (decoder.finish(), true),
        };

        if let Some(end) = dispatch(events, sink)? {
            engine_info!(
                "Chat stream done after {} chunks ({} malformed lines skipped)",
                chunks,
                decoder.malformed_lines()
            );
            return Ok(end);
        }
        if finished {
            engine_info!(
                "Chat stream closed after {} chunks without done ({} malformed lines skipped)",
                chunks,
                decoder.malformed_lines()
            );
            return Ok(StreamEnd::Closed);
        }
    }
}

fn dispatch(
    events: Vec<StreamEvent>,
    sink: &dyn StreamSink,
) -> Result<Option<StreamEnd>, RelayError> {
    for event in events {
        match event {
            StreamEvent::Done { thread_id, .. } => return Ok(Some(StreamEnd::Done { thread_id })),
            StreamEvent::Error { content } => return Err(RelayError::Server(content)),
            other => sink.emit(other),
        }
    }
    Ok(None)
}
