//! The `sourceStream` stage: raw media bytes pulled from the media host.

use std::io;

use bytes::Bytes;
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use reqwest::{
    Client, Response, StatusCode, Url,
    header::{RANGE, USER_AGENT},
};

use crate::sources::{classify::UpstreamError, format::AudioFormat};

/// Raw media bytes. Dropping the stream releases the underlying connection.
pub type SourceStream = BoxStream<'static, io::Result<Bytes>>;

/// Opens `format.url` for reading.
///
/// When the content length is known the body is fetched as consecutive
/// `Range` requests of `chunk_size` bytes, since media hosts throttle long
/// unranged downloads. Only the first request is awaited here; later ones
/// are issued as the consumer drains the stream. A host that answers the
/// first range with the whole body is read unranged from there.
pub async fn open_http_stream(
    client: &Client,
    format: &AudioFormat,
    chunk_size: u64,
) -> Result<SourceStream, UpstreamError> {
    let url = Url::parse(&format.url)
        .map_err(|e| UpstreamError::other(format!("invalid media URL: {}", e)))?;
    let user_agent = format.user_agent.clone();

    let Some(total) = format.content_length.filter(|len| *len > 0) else {
        let response = send(client, &url, user_agent.as_deref(), None).await?;
        return Ok(response.bytes_stream().map_err(io::Error::other).boxed());
    };

    let chunk = chunk_size.max(1);
    let first_end = chunk.min(total) - 1;
    let first = send(client, &url, user_agent.as_deref(), Some((0, first_end))).await?;
    if first.status() != StatusCode::PARTIAL_CONTENT {
        tracing::debug!(
            "media host ignored Range ({}), reading unranged",
            first.status()
        );
        return Ok(first.bytes_stream().map_err(io::Error::other).boxed());
    }

    let client = client.clone();
    let rest = stream::iter((first_end + 1..total).step_by(chunk as usize))
        .then(move |start| {
            let client = client.clone();
            let url = url.clone();
            let user_agent = user_agent.clone();
            let end = (start + chunk).min(total) - 1;
            async move {
                let response = send(&client, &url, user_agent.as_deref(), Some((start, end)))
                    .await
                    .map_err(io::Error::other)?;
                if response.status() != StatusCode::PARTIAL_CONTENT {
                    return Err(io::Error::other(format!(
                        "media host answered {} to range {}-{}",
                        response.status(),
                        start,
                        end
                    )));
                }
                Ok::<_, io::Error>(response.bytes_stream().map_err(io::Error::other))
            }
        })
        .try_flatten();

    Ok(first
        .bytes_stream()
        .map_err(io::Error::other)
        .chain(rest)
        .boxed())
}

async fn send(
    client: &Client,
    url: &Url,
    user_agent: Option<&str>,
    range: Option<(u64, u64)>,
) -> Result<Response, UpstreamError> {
    let mut req = client.get(url.clone());
    if let Some(ua) = user_agent {
        req = req.header(USER_AGENT, ua);
    }
    if let Some((start, end)) = range {
        req = req.header(RANGE, format!("bytes={}-{}", start, end));
    }

    let response = req.send().await?;
    if !response.status().is_success() {
        return Err(UpstreamError::from_status(
            response.status(),
            "media request",
        ));
    }

    tracing::trace!(
        "media request {:?} -> {} ({:?} bytes)",
        range,
        response.status(),
        response.content_length()
    );
    Ok(response)
}
