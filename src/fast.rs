use crate::decode::RowDecoder;
use crate::schema::{CsvRecord, Schema};
use crate::{CsvMapError, CsvResult};
use memchr::memchr;
use memmap2::MmapOptions;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// Local-file path for uncompressed UTF-8 sources: maps the file and cuts lines
/// with `memchr` instead of going through the async line stream.
/// Uses `path` when given, otherwise the path from `T`'s table configuration.
pub fn fast_local_read<T: CsvRecord>(path: Option<&Path>) -> CsvResult<Vec<T>> {
    let schema = Schema::<T>::resolve()?;
    let path = path.unwrap_or_else(|| schema.path());
    let file = File::open(path).map_err(|source| CsvMapError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let len = file.metadata()?.len() as usize;
    if len == 0 {
        return Err(CsvMapError::EmptyHeaderLine);
    }
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    decode_bytes(&schema, &mmap[..])
}

fn decode_bytes<T: CsvRecord>(schema: &Schema<T>, data: &[u8]) -> CsvResult<Vec<T>> {
    let mut cursor = 0usize;
    let mut lines = std::iter::from_fn(move || {
        if cursor >= data.len() {
            return None;
        }
        let end = memchr(b'\n', &data[cursor..]).map_or(data.len(), |off| cursor + off);
        let line = &data[cursor..end];
        cursor = end + 1;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    });

    let header = lines.next().ok_or(CsvMapError::EmptyHeaderLine)?;
    let decoder = RowDecoder::from_header_line(schema, utf8(header, 1)?)?;

    let mut records = Vec::new();
    for (i, line) in lines.enumerate() {
        let line_no = i + 2;
        records.push(decoder.decode(line_no, utf8(line, line_no)?)?);
    }
    debug!(rows = records.len(), "decoded rows (fast local)");
    Ok(records)
}

fn utf8(bytes: &[u8], line_no: usize) -> CsvResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        CsvMapError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line {line_no}: {e}"),
        ))
    })
}
