// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Server-sent event line decoding.
//!
//! Network reads split the body at arbitrary byte offsets, so partial lines
//! (and partial UTF-8 sequences) are buffered until their newline arrives.

/// A `data:` payload from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// JSON payload of one event.
    Payload(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Incremental SSE line splitter.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network read, returning every complete data line it finished.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseData> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseData> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);

    // Blank separators, `:` comments and non-data fields (event, id, retry).
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == "[DONE]" {
        Some(SseData::Done)
    } else if data.trim().is_empty() {
        None
    } else {
        Some(SseData::Payload(data.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines() {
        let mut decoder = SseLineDecoder::new();
        let out = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(
            out,
            vec![
                SseData::Payload("{\"a\":1}".to_string()),
                SseData::Payload("{\"b\":2}".to_string()),
            ]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"content\":").is_empty());
        assert!(decoder.push(b"\"Hel").is_empty());
        let out = decoder.push(b"lo\"}\n");
        assert_eq!(out, vec![SseData::Payload("{\"content\":\"Hello\"}".to_string())]);
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        let line = "data: {\"t\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.len() - 4;
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        let out = decoder.push(&line[split..]);
        assert_eq!(out, vec![SseData::Payload("{\"t\":\"caf\u{e9}\"}".to_string())]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut decoder = SseLineDecoder::new();
        let out = decoder.push(b": keep-alive\nevent: message\nid: 7\nretry: 100\ndata: {}\n");
        assert_eq!(out, vec![SseData::Payload("{}".to_string())]);
    }

    #[test]
    fn test_done_and_crlf() {
        let mut decoder = SseLineDecoder::new();
        let out = decoder.push(b"data: {\"x\":1}\r\n\r\ndata: [DONE]\r\n");
        assert_eq!(
            out,
            vec![SseData::Payload("{\"x\":1}".to_string()), SseData::Done]
        );
    }

    #[test]
    fn test_data_without_space() {
        let mut decoder = SseLineDecoder::new();
        assert_eq!(decoder.push(b"data:[DONE]\n"), vec![SseData::Done]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"tail\":true}").is_empty());
        assert_eq!(
            decoder.finish(),
            vec![SseData::Payload("{\"tail\":true}".to_string())]
        );
        assert!(decoder.finish().is_empty());
    }
}
