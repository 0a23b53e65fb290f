use crate::error::ChatApiError;
use crate::payload::ChatChunk;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder for line-delimited `data: {json}` streams.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across reads decode intact.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseLineDecoder {
    /// Feed arbitrary bytes and drain the content deltas of every complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, ChatApiError> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=split).collect();
            self.decode_line(&line, &mut deltas)?;
        }

        Ok(deltas)
    }

    /// Decode a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Result<Vec<String>, ChatApiError> {
        let line = std::mem::take(&mut self.buffer);
        let mut deltas = Vec::new();
        self.decode_line(&line, &mut deltas)?;
        Ok(deltas)
    }

    /// Decode a complete payload in one shot.
    pub fn decode_all(input: &str) -> Result<Vec<String>, ChatApiError> {
        let mut decoder = Self::default();
        let mut deltas = decoder.feed(input.as_bytes())?;
        deltas.extend(decoder.finish()?);
        Ok(deltas)
    }

    /// True once the `[DONE]` sentinel was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    fn decode_line(&mut self, raw: &[u8], deltas: &mut Vec<String>) -> Result<(), ChatApiError> {
        if self.done {
            return Ok(());
        }

        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }

        let payload = line
            .strip_prefix(DATA_PREFIX)
            .map(str::trim_start)
            .unwrap_or(line);
        if payload == DONE_SENTINEL {
            self.done = true;
            return Ok(());
        }

        let chunk: ChatChunk =
            serde_json::from_str(payload).map_err(|source| ChatApiError::MalformedChunk {
                line: line.to_owned(),
                source,
            })?;
        if let Some(delta) = chunk.first_delta().filter(|delta| !delta.is_empty()) {
            deltas.push(delta.to_owned());
        }
        Ok(())
    }
}
