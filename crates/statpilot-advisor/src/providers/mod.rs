//! HTTP transports for the supported backends

pub mod decoder;
pub mod local;
pub mod remote;

pub use decoder::LineDecoder;
pub use local::LocalTransport;
pub use remote::RemoteTransport;

use futures::StreamExt;
use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AdvisorError;

/// Longest error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

/// What a line handler wants to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineControl {
    Continue,
    Stop,
}

/// Map an error status to the advisor taxonomy
pub(crate) fn status_error(status: u16, body: &str, model: &str) -> AdvisorError {
    match status {
        401 | 403 => AdvisorError::AuthRejected(status),
        404 => AdvisorError::ModelUnavailable(model.to_string()),
        _ => AdvisorError::Http {
            status,
            body: truncate_body(body),
        },
    }
}

/// Pass successful responses through; turn everything else into an error
pub(crate) async fn check_status(
    response: Response,
    model: &str,
) -> Result<Response, AdvisorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Request for model {} failed with status {}", model, status);
    Err(status_error(status.as_u16(), &body, model))
}

/// Probe responses only need to be reachable; redirects count as alive
pub(crate) fn check_probe_status(response: &Response) -> Result<(), AdvisorError> {
    let status = response.status();
    if status.is_success() || status.is_redirection() {
        return Ok(());
    }
    match status.as_u16() {
        401 | 403 => Err(AdvisorError::AuthRejected(status.as_u16())),
        code => Err(AdvisorError::Http {
            status: code,
            body: String::new(),
        }),
    }
}

/// Send a request, aborting as soon as `cancel` fires
pub(crate) async fn send_cancellable(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response, AdvisorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AdvisorError::Cancelled),
        result = request.send() => result.map_err(AdvisorError::from),
    }
}

/// Read a chunked body line by line until the handler stops or the body ends.
///
/// Cancellation is checked between network chunks, so an idle stream still
/// aborts promptly.
pub(crate) async fn read_lines<F>(
    response: Response,
    cancel: &CancellationToken,
    mut on_line: F,
) -> Result<(), AdvisorError>
where
    F: FnMut(&str) -> Result<LineControl, AdvisorError>,
{
    let mut body = response.bytes_stream();
    let mut decoder = LineDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AdvisorError::Cancelled),
            next = body.next() => next,
        };

        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(AdvisorError::from)?;

        for line in decoder.push(&chunk) {
            if on_line(&line)? == LineControl::Stop {
                return Ok(());
            }
        }
    }

    if let Some(line) = decoder.finish() {
        debug!("Processing unterminated trailing line");
        on_line(&line)?;
    }

    Ok(())
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
