use crate::{CsvMapError, CsvResult};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::codec::FramedRead;

use crate::codec::LineCodec;

/// Text lines of one source, already decompressed and transcoded to UTF-8.
pub type LineStream = FramedRead<Box<dyn AsyncRead + Unpin + Send>, LineCodec>;

/// Describes how the bytes of a source are packaged.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// MIME type, e.g. "text/csv" or "application/gzip"
    pub content_type: String,
    /// Comma-separated content codings, e.g. "gzip" or "zstd"
    pub content_encoding: String,
    /// File name or object key, checked for `.gz` / `.zst`
    pub name_hint: String,
    /// Source character set, UTF-8 unless told otherwise
    pub charset: &'static encoding_rs::Encoding,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            content_type: String::new(),
            content_encoding: String::new(),
            name_hint: String::new(),
            charset: encoding_rs::UTF_8,
        }
    }
}

impl SourceMeta {
    /// Best-effort meta from a file name's extension.
    pub fn from_path(path: &Path) -> Self {
        let name_hint = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let (content_type, content_encoding) = match ext {
            "gz" => ("application/gzip", "gzip"),
            "zst" => ("application/zstd", "zstd"),
            _ => ("text/csv", ""),
        };
        Self {
            content_type: content_type.into(),
            content_encoding: content_encoding.into(),
            name_hint,
            ..Default::default()
        }
    }

    pub fn with_charset(mut self, charset: &'static encoding_rs::Encoding) -> Self {
        self.charset = charset;
        self
    }

    fn is_gzip(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "gzip")
            || matches!(ct.as_str(), "application/gzip" | "application/x-gzip")
            || self.name_hint.ends_with(".gz")
    }

    fn is_zstd(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "zstd")
            || ct == "application/zstd"
            || self.name_hint.ends_with(".zst")
    }
}

/// Wraps any `AsyncRead` with optional decompression (encoding, then type, then
/// extension decide) and frames it into lines in the declared charset.
pub fn line_stream<R>(raw: R, meta: &SourceMeta) -> LineStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // Use a larger buffer for fewer syscalls (1 MiB)
    let buf = BufReader::with_capacity(1 << 20, raw);
    let decompressed: Box<dyn AsyncRead + Unpin + Send> = if meta.is_gzip() {
        Box::new(GzipDecoder::new(buf))
    } else if meta.is_zstd() {
        Box::new(ZstdDecoder::new(buf))
    } else {
        Box::new(buf)
    };

    FramedRead::new(decompressed, LineCodec::new(meta.charset))
}

/// Opens a local file as a line stream.
pub async fn lines_from_path(path: &Path) -> CsvResult<(LineStream, SourceMeta)> {
    let file = File::open(path).await.map_err(|source| CsvMapError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let meta = SourceMeta::from_path(path);
    Ok((line_stream(file, &meta), meta))
}
