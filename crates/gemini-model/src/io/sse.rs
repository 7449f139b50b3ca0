use bytes::{Buf, BytesMut};

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only `data` fields are understood, and each event is expected to
/// carry exactly one of them, which is how the Gemini endpoint frames
/// its stream.
pub struct Sse {
    buf: BytesMut,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is already buffered before reading more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            // Line endings are normalized to LF, so a CRLF-framed stream
            // splits the same way as a LF-framed one. Bytes are kept raw
            // until a whole event is in, since a chunk may end in the
            // middle of a multi-byte character.
            self.buf
                .extend(bytes.iter().copied().filter(|b| *b != b'\r'));
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event         = *( comment / field ) end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        let Some(eol_idx) = self.buf.windows(2).position(|w| w == b"\n\n")
        else {
            return Ok(None);
        };

        let field = str::from_utf8(&self.buf[0..eol_idx])
            .map_err(|_| Error::InvalidPayload)?;
        let Some((header, data)) = field.split_once(':') else {
            return Err(Error::InvalidPayload);
        };
        if header != "data" {
            // Other fields are not supported.
            return Err(Error::InvalidPayload);
        }
        let data = data.strip_prefix(' ').unwrap_or(data).to_owned();

        // Consume the bytes from the buffer.
        self.buf.advance(eol_idx + 2);

        Ok(Some(data))
    }
}
