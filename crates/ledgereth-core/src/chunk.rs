//! Chunked transfer of payloads larger than one APDU frame.
//!
//! Signing requests carry `count || path || body` which routinely exceeds the
//! 255 byte data limit of a short APDU. The payload is cut into consecutive
//! chunks; the first goes out with the template's "first data" command and the
//! rest with its "secondary data" command. The device answers every frame and
//! the last answer carries the result.

use std::iter::FusedIterator;

use tracing::debug;

use crate::apdu::{Command, MAX_DATA_LEN};
use crate::device::{Channel, transmit};
use crate::error::{Error, Result};
use crate::path::DerivationPath;

/// Default chunk size, the largest short APDU payload.
pub const DEFAULT_CHUNK_SIZE: usize = MAX_DATA_LEN;

/// Iterator over the chunks of a payload, see [`split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    payload: &'a [u8],
    chunk_size: usize,
    remaining: usize,
}

/// Splits `payload` into chunks of at most `chunk_size` bytes.
///
/// A payload no longer than `chunk_size` yields exactly one chunk, even when
/// empty. Longer payloads yield `len / chunk_size` full chunks followed by
/// the non-empty remainder, if any. A `chunk_size` of zero is treated as one.
///
/// # Example
///
/// ```
/// use ledgereth_core::chunk::split;
///
/// let payload = [0u8; 300];
/// let sizes: Vec<usize> = split(&payload, 255).map(<[u8]>::len).collect();
/// assert_eq!(sizes, vec![255, 45]);
/// ```
#[must_use]
pub fn split(payload: &[u8], chunk_size: usize) -> Chunks<'_> {
    let chunk_size = chunk_size.max(1);
    let remaining = if payload.len() <= chunk_size {
        1
    } else {
        payload.len().div_ceil(chunk_size)
    };

    Chunks {
        payload,
        chunk_size,
        remaining,
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let take = self.chunk_size.min(self.payload.len());
        let (chunk, rest) = self.payload.split_at(take);
        self.payload = rest;
        self.remaining -= 1;

        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

impl FusedIterator for Chunks<'_> {}

/// Sends `count || path || body` in consecutive frames and returns the data of
/// the final response.
///
/// # Arguments
///
/// * `channel` - Open channel to the device
/// * `first` - Template of the first frame
/// * `continuation` - Template of every following frame
/// * `path` - Derivation path prepended to the body
/// * `body` - Request body
/// * `chunk_size` - Maximum data bytes per frame
/// * `min_response_len` - Minimum length of the final response data
///
/// # Errors
///
/// - The translated status word of the first frame the device rejects
/// - [`Error::Protocol`] if the channel fails or the final response is
///   shorter than `min_response_len`
pub fn send_framed(
    channel: &mut dyn Channel,
    first: Command,
    continuation: Command,
    path: &DerivationPath,
    body: &[u8],
    chunk_size: usize,
    min_response_len: usize,
) -> Result<Vec<u8>> {
    let mut payload = path.to_device_payload()?;
    payload.extend_from_slice(body);

    let chunk_size = chunk_size.clamp(1, MAX_DATA_LEN);
    let chunks = split(&payload, chunk_size);
    debug!(
        command = %first,
        payload_len = payload.len(),
        frames = chunks.len(),
        "sending framed payload"
    );

    let mut last = Vec::new();
    for (i, chunk) in chunks.enumerate() {
        let template = if i == 0 { first } else { continuation };
        let apdu = template.command(Some(chunk), None, None)?;
        last = transmit(channel, &apdu)?.into_checked_data()?;
    }

    if last.len() < min_response_len {
        return Err(Error::Protocol(format!(
            "final response has {} bytes, expected at least {min_response_len}",
            last.len()
        )));
    }

    Ok(last)
}
