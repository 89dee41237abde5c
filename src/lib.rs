//! Schema-driven mapping of delimited text records into typed structs.
//!
//! - A target type implements [`CsvRecord`]: table configuration (path,
//!   delimiter) plus one typed binding per field.
//! - [`Schema::resolve`] validates that declaration once per read.
//! - The first line of a source is the header; every following line becomes one
//!   record, in source order.
//!
//! Sources: any iterator of lines ([`decode_lines`]), any `AsyncRead` with optional
//! gzip/zstd and charset transcoding ([`read_from_reader`]), local files
//! ([`read`], [`read_from_path`]), and with feature `fast_local` an mmap path.
//!
//! Error policy: the first failure aborts the read. Configuration and header
//! problems surface before any row is decoded. A row shorter than the header is
//! not an error; the missing fields keep their defaults.
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod codec;
pub mod coerce;
mod decode;
#[cfg(feature = "fast_local")]
mod fast;
mod header;
mod io;
pub mod schema;
pub mod temporal;

pub use crate::codec::LineCodec;
pub use crate::coerce::{CoercionError, Element};
pub use crate::decode::{decode_lines, RowDecoder};
#[cfg(feature = "fast_local")]
pub use crate::fast::fast_local_read;
pub use crate::header::{Delimiter, HeaderIndex};
pub use crate::io::{line_stream, lines_from_path, LineStream, SourceMeta};
pub use crate::schema::{
    ColumnBinding, ColumnKind, Columns, Container, ContainerShape, CsvRecord, ElementKind,
    ScalarType, Schema, SchemaError, TableConfig, TemporalRepr, Truthy,
};
pub use crate::temporal::Temporal;

use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::debug;

/// Error type returned by this crate when not using `anyhow`.
#[derive(Debug, Error)]
pub enum CsvMapError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("source has no header line")]
    EmptyHeaderLine,
    #[error("column '{0}' not found in header")]
    UnknownColumn(String),
    #[error("line {line}, column '{column}': {source}")]
    Coercion {
        line: usize,
        column: String,
        #[source]
        source: CoercionError,
    },
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CsvResult<T> = std::result::Result<T, CsvMapError>;

/// Decodes a stream of lines. The first item is the header.
pub async fn read_lines_stream<T, S>(schema: &Schema<T>, mut lines: S) -> CsvResult<Vec<T>>
where
    T: CsvRecord,
    S: Stream<Item = std::io::Result<String>> + Unpin,
{
    let header = lines.next().await.ok_or(CsvMapError::EmptyHeaderLine)??;
    let decoder = RowDecoder::from_header_line(schema, &header)?;

    let mut records = Vec::new();
    let mut line_no = 1usize;
    while let Some(line) = lines.next().await {
        line_no += 1;
        records.push(decoder.decode(line_no, &line?)?);
    }
    debug!(rows = records.len(), "decoded rows");
    Ok(records)
}

/// Decodes an `AsyncRead` source described by `meta`.
pub async fn read_from_reader<T, R>(reader: R, meta: &SourceMeta) -> CsvResult<Vec<T>>
where
    T: CsvRecord,
    R: AsyncRead + Unpin + Send + 'static,
{
    let schema = Schema::<T>::resolve()?;
    read_lines_stream(&schema, line_stream(reader, meta)).await
}

/// Decodes the file at `path`, ignoring the path in `T`'s table configuration
/// (which must still be declared).
pub async fn read_from_path<T: CsvRecord>(path: impl AsRef<Path>) -> CsvResult<Vec<T>> {
    let schema = Schema::<T>::resolve()?;
    let (lines, _meta) = lines_from_path(path.as_ref()).await?;
    read_lines_stream(&schema, lines).await
}

/// Decodes the file named by `T`'s table configuration.
pub async fn read<T: CsvRecord>() -> CsvResult<Vec<T>> {
    let schema = Schema::<T>::resolve()?;
    let (lines, _meta) = lines_from_path(schema.path()).await?;
    read_lines_stream(&schema, lines).await
}
