use bytes::{Buf, BytesMut};
use encoding_rs::CoderResult;
use std::io;
use tokio_util::codec::Decoder;

/// Frames a byte stream into text lines, transcoding from the source charset
/// to UTF-8 on the way. A leading BOM is removed, `\n` and `\r\n` both end a
/// line, and malformed sequences become U+FFFD.
pub struct LineCodec {
    decoder: encoding_rs::Decoder,
    pending: String,
}

impl LineCodec {
    pub fn new(encoding: &'static encoding_rs::Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder(),
            pending: String::new(),
        }
    }

    fn transcode(&mut self, src: &mut BytesMut, last: bool) {
        loop {
            let room = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or_else(|| src.len() * 3 + 16);
            self.pending.reserve(room);
            let (result, read, _had_errors) =
                self.decoder.decode_to_string(src, &mut self.pending, last);
            src.advance(read);
            if let CoderResult::InputEmpty = result {
                break;
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.find('\n')?;
        let mut line: String = self.pending.drain(..=end).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        self.transcode(src, false);
        Ok(self.take_line())
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        self.transcode(buf, true);
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.pending);
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Vec<String> {
        let mut codec = LineCodec::new(encoding);
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            out.push(line);
        }
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn splits_lf_and_crlf() {
        assert_eq!(frame(encoding_rs::UTF_8, b"a;b\r\nc;d\ne"), vec!["a;b", "c;d", "e"]);
    }

    #[test]
    fn trailing_newline_adds_no_empty_line() {
        assert_eq!(frame(encoding_rs::UTF_8, b"a\nb\n"), vec!["a", "b"]);
        assert!(frame(encoding_rs::UTF_8, b"").is_empty());
    }

    #[test]
    fn keeps_blank_lines_in_the_middle() {
        assert_eq!(frame(encoding_rs::UTF_8, b"a\n\nb"), vec!["a", "", "b"]);
    }

    #[test]
    fn strips_utf8_bom() {
        assert_eq!(frame(encoding_rs::UTF_8, b"\xEF\xBB\xBFname\nAna"), vec!["name", "Ana"]);
    }

    #[test]
    fn transcodes_latin1() {
        assert_eq!(frame(encoding_rs::WINDOWS_1252, b"Jos\xE9;S\xE3o\n"), vec!["José;São"]);
    }

    #[test]
    fn multibyte_sequence_split_across_reads() {
        let mut codec = LineCodec::new(encoding_rs::UTF_8);
        let mut first = BytesMut::from(&b"Jos\xC3"[..]);
        assert_eq!(codec.decode(&mut first).unwrap(), None);
        let mut rest = BytesMut::from(&b"\xA9\n"[..]);
        assert_eq!(codec.decode(&mut rest).unwrap(), Some("José".to_string()));
    }
}
