//! Row and collection decoding.

use tracing::{debug, trace};

use crate::coerce::CoercionError;
use crate::header::{HeaderIndex, Splitter};
use crate::schema::{CsvRecord, Schema};
use crate::{CsvMapError, CsvResult};

/// Splits a collection cell and coerces every token. Fails on the first bad token.
pub(crate) fn decode_collection<E, F>(
    cell: &str,
    splitter: &Splitter,
    coerce: F,
) -> Result<Vec<E>, CoercionError>
where
    F: Fn(&str) -> Result<E, CoercionError>,
{
    splitter.split(cell).into_iter().map(coerce).collect()
}

/// Decodes data lines of one source against a schema and its header.
///
/// Every binding is matched to a header position up front, so an unknown column
/// fails before the first data row is touched.
#[derive(Debug)]
pub struct RowDecoder<'s, T> {
    schema: &'s Schema<T>,
    positions: Vec<usize>,
}

impl<'s, T: CsvRecord> RowDecoder<'s, T> {
    pub fn new(schema: &'s Schema<T>, header: &HeaderIndex) -> CsvResult<Self> {
        let positions = schema
            .bindings()
            .iter()
            .map(|b| {
                header
                    .position(b.column())
                    .ok_or_else(|| CsvMapError::UnknownColumn(b.column().to_string()))
            })
            .collect::<CsvResult<Vec<_>>>()?;

        Ok(Self { schema, positions })
    }

    /// Resolves the header from its raw line.
    pub fn from_header_line(schema: &'s Schema<T>, line: &str) -> CsvResult<Self> {
        let header = schema.header_index(line);
        debug!(columns = header.width(), "resolved header");
        Self::new(schema, &header)
    }

    /// Decodes one data line. `line_no` is the 1-based position in the source
    /// and is only used for error reporting.
    ///
    /// Columns past the end of a short row leave their fields at the default.
    pub fn decode(&self, line_no: usize, line: &str) -> CsvResult<T> {
        let cells = self.schema.splitter().split(line);
        let mut record = T::default();

        for (binding, &pos) in self.schema.bindings().iter().zip(&self.positions) {
            let Some(cell) = cells.get(pos) else {
                trace!(line = line_no, column = binding.column(), "short row, keeping default");
                continue;
            };
            binding
                .apply(&mut record, cell)
                .map_err(|source| CsvMapError::Coercion {
                    line: line_no,
                    column: binding.column().to_string(),
                    source,
                })?;
        }
        Ok(record)
    }
}

/// Decodes a whole source given as lines. The first line is the header.
pub fn decode_lines<T, I, S>(schema: &Schema<T>, lines: I) -> CsvResult<Vec<T>>
where
    T: CsvRecord,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut lines = lines.into_iter();
    let header = lines.next().ok_or(CsvMapError::EmptyHeaderLine)?;
    let decoder = RowDecoder::from_header_line(schema, header.as_ref())?;

    let mut out = Vec::new();
    for (i, line) in lines.enumerate() {
        out.push(decoder.decode(i + 2, line.as_ref())?);
    }
    debug!(rows = out.len(), "decoded rows");
    Ok(out)
}
