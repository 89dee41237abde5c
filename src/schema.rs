//! Schema declaration and resolution.
//!
//! A target type implements [`CsvRecord`]: it names its table configuration and
//! declares one binding per mapped field through the typed [`Columns`] builder.
//! [`Schema::resolve`] validates the declaration and produces the binding list
//! consumed by the row decoder.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::coerce::{is_truthy, CoercionError, Element};
use crate::decode::decode_collection;
use crate::header::{Delimiter, HeaderIndex, Splitter};
use crate::temporal::{DatePattern, Temporal};

/// Problems found while resolving a schema. Always fatal to the read.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("type {type_name} declares no table configuration")]
    MissingTableConfig { type_name: &'static str },
    #[error("table configuration of {type_name} has no source path")]
    MissingPath { type_name: &'static str },
    #[error("table configuration of {type_name} has no delimiter")]
    MissingDelimiter { type_name: &'static str },
    #[error("invalid delimiter pattern '{delimiter}': {source}")]
    InvalidDelimiter {
        delimiter: String,
        #[source]
        source: regex::Error,
    },
    #[error("collection column '{column}' has an empty element delimiter")]
    EmptyElementDelimiter { column: String },
    #[error("invalid date pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("nested type {type_name} has no binding for column '{column}'")]
    UnknownNestedColumn {
        type_name: &'static str,
        column: String,
    },
    #[error("nested type {type_name} contains itself")]
    RecursiveNesting { type_name: &'static str },
}

/// Table-level configuration: where the source lives and how its lines are cut.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableConfig {
    pub path: Option<PathBuf>,
    pub delimiter: Option<Delimiter>,
}

impl TableConfig {
    pub fn new(path: impl Into<PathBuf>, delimiter: impl Into<Delimiter>) -> Self {
        Self {
            path: Some(path.into()),
            delimiter: Some(delimiter.into()),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<Delimiter>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalRepr {
    /// Absolute point in time, read as UTC unless the pattern carries an offset.
    Instant,
    DateTime,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    OrderedList,
    UniqueSet,
    FixedArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Scalar(ScalarType),
    NestedRecord,
}

/// How one cell is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar(ScalarType),
    BooleanTruthy {
        case_sensitive: bool,
        true_values: Vec<String>,
    },
    Temporal {
        pattern: String,
        representation: TemporalRepr,
    },
    Collection {
        element_delimiter: Delimiter,
        shape: ContainerShape,
        element: ElementKind,
    },
}

type Apply<T> = Arc<dyn Fn(&mut T, &str) -> Result<(), CoercionError> + Send + Sync>;

/// One resolved rule: a named column, how to coerce it, and which field receives it.
pub struct ColumnBinding<T> {
    column: String,
    field: &'static str,
    kind: ColumnKind,
    apply: Apply<T>,
}

impl<T> ColumnBinding<T> {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Coerces `cell` and writes it into the bound field of `record`.
    pub fn apply(&self, record: &mut T, cell: &str) -> Result<(), CoercionError> {
        (self.apply)(record, cell)
    }
}

impl<T> Clone for ColumnBinding<T> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            field: self.field,
            kind: self.kind.clone(),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<T> fmt::Debug for ColumnBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBinding")
            .field("column", &self.column)
            .field("field", &self.field)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> PartialEq for ColumnBinding<T> {
    fn eq(&self, other: &Self) -> bool {
        self.column == other.column && self.field == other.field && self.kind == other.kind
    }
}

/// The set of truthy literals for a boolean column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truthy {
    values: Vec<String>,
    case_sensitive: bool,
}

impl Truthy {
    /// Case-insensitive by default. Duplicates are dropped, first occurrence kept.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for v in values {
            let v = v.into();
            if !out.contains(&v) {
                out.push(v);
            }
        }
        Self {
            values: out,
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }
}

/// A container a collection column can be written into.
pub trait Container: Send + Sync + 'static {
    type Item;
    const SHAPE: ContainerShape;

    fn from_items(items: Vec<Self::Item>) -> Self;
}

impl<E: Send + Sync + 'static> Container for Vec<E> {
    type Item = E;
    const SHAPE: ContainerShape = ContainerShape::OrderedList;

    fn from_items(items: Vec<E>) -> Self {
        items
    }
}

impl<E: Send + Sync + 'static> Container for Box<[E]> {
    type Item = E;
    const SHAPE: ContainerShape = ContainerShape::FixedArray;

    fn from_items(items: Vec<E>) -> Self {
        items.into_boxed_slice()
    }
}

impl<E: Eq + Hash + Send + Sync + 'static> Container for HashSet<E> {
    type Item = E;
    const SHAPE: ContainerShape = ContainerShape::UniqueSet;

    fn from_items(items: Vec<E>) -> Self {
        items.into_iter().collect()
    }
}

impl<E: Ord + Send + Sync + 'static> Container for BTreeSet<E> {
    type Item = E;
    const SHAPE: ContainerShape = ContainerShape::UniqueSet;

    fn from_items(items: Vec<E>) -> Self {
        items.into_iter().collect()
    }
}

/// Builder for the bindings of one target type.
///
/// Every method takes the CSV column name, the name of the receiving field (used
/// for diagnostics and schema comparison) and a setter. The setter's value type
/// selects the coercion, so a column can only ever be bound to a field that can
/// hold what it decodes to.
pub struct Columns<T> {
    bindings: Vec<ColumnBinding<T>>,
    error: Option<SchemaError>,
}

impl<T> Default for Columns<T> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            error: None,
        }
    }
}

impl<T: 'static> Columns<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        mut self,
        column: &str,
        field: &'static str,
        kind: ColumnKind,
        apply: Apply<T>,
    ) -> Self {
        self.bindings.push(ColumnBinding {
            column: column.to_string(),
            field,
            kind,
            apply,
        });
        self
    }

    fn fail(mut self, err: SchemaError) -> Self {
        self.error.get_or_insert(err);
        self
    }

    /// A text, integer or boolean-literal column, chosen by `V`.
    pub fn scalar<V, F>(self, column: &str, field: &'static str, set: F) -> Self
    where
        V: Element,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let apply: Apply<T> = Arc::new(
            move |record: &mut T, cell: &str| -> Result<(), CoercionError> {
                set(record, V::coerce(cell)?);
                Ok(())
            },
        );
        self.push(column, field, ColumnKind::Scalar(V::KIND), apply)
    }

    /// A boolean column that is `true` when the cell is in the truthy set.
    pub fn truthy<F>(self, column: &str, field: &'static str, truthy: Truthy, set: F) -> Self
    where
        F: Fn(&mut T, bool) + Send + Sync + 'static,
    {
        let kind = ColumnKind::BooleanTruthy {
            case_sensitive: truthy.case_sensitive,
            true_values: truthy.values.clone(),
        };
        let apply: Apply<T> = Arc::new(
            move |record: &mut T, cell: &str| -> Result<(), CoercionError> {
                set(record, is_truthy(cell, &truthy.values, truthy.case_sensitive));
                Ok(())
            },
        );
        self.push(column, field, kind, apply)
    }

    /// A date column. The representation follows `D`: `NaiveDate`,
    /// `NaiveDateTime` or `DateTime<Utc>`.
    pub fn temporal<D, F>(self, column: &str, field: &'static str, pattern: &str, set: F) -> Self
    where
        D: Temporal,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        let pattern = match DatePattern::parse(pattern) {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };
        let kind = ColumnKind::Temporal {
            pattern: pattern.as_str().to_string(),
            representation: D::REPRESENTATION,
        };
        let apply: Apply<T> = Arc::new(
            move |record: &mut T, cell: &str| -> Result<(), CoercionError> {
                set(record, D::parse(cell, &pattern)?);
                Ok(())
            },
        );
        self.push(column, field, kind, apply)
    }

    /// A cell holding several scalar values separated by `element_delimiter`.
    /// The container shape follows `C`: `Vec`, `Box<[_]>`, `HashSet` or `BTreeSet`.
    pub fn collection<C, F>(
        self,
        column: &str,
        field: &'static str,
        element_delimiter: impl Into<Delimiter>,
        set: F,
    ) -> Self
    where
        C: Container,
        C::Item: Element,
        F: Fn(&mut T, C) + Send + Sync + 'static,
    {
        let delimiter = element_delimiter.into();
        if delimiter.is_empty() {
            return self.fail(SchemaError::EmptyElementDelimiter {
                column: column.to_string(),
            });
        }
        let splitter = match Splitter::compile(&delimiter) {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        let kind = ColumnKind::Collection {
            element_delimiter: delimiter,
            shape: C::SHAPE,
            element: ElementKind::Scalar(<C::Item as Element>::KIND),
        };
        let apply: Apply<T> = Arc::new(
            move |record: &mut T, cell: &str| -> Result<(), CoercionError> {
                let items = decode_collection(cell, &splitter, <C::Item as Element>::coerce)?;
                set(record, C::from_items(items));
                Ok(())
            },
        );
        self.push(column, field, kind, apply)
    }

    /// A cell holding several tokens, each becoming one nested record of type
    /// `C::Item`. Only the nested binding whose column name equals `column` is
    /// applied to each token; every other nested field keeps its default.
    /// A nested type that contains itself, directly or through another nested
    /// type, fails with [`SchemaError::RecursiveNesting`].
    pub fn nested<C, F>(
        self,
        column: &str,
        field: &'static str,
        element_delimiter: impl Into<Delimiter>,
        set: F,
    ) -> Self
    where
        C: Container,
        C::Item: CsvRecord,
        F: Fn(&mut T, C) + Send + Sync + 'static,
    {
        let delimiter = element_delimiter.into();
        if delimiter.is_empty() {
            return self.fail(SchemaError::EmptyElementDelimiter {
                column: column.to_string(),
            });
        }
        let splitter = match Splitter::compile(&delimiter) {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        let inner = match nested_bindings::<C::Item>() {
            Ok(bindings) => bindings.into_iter().find(|b| b.column == column),
            Err(e) => return self.fail(e),
        };
        let Some(inner) = inner else {
            return self.fail(SchemaError::UnknownNestedColumn {
                type_name: std::any::type_name::<C::Item>(),
                column: column.to_string(),
            });
        };
        let kind = ColumnKind::Collection {
            element_delimiter: delimiter,
            shape: C::SHAPE,
            element: ElementKind::NestedRecord,
        };
        let apply: Apply<T> = Arc::new(
            move |record: &mut T, cell: &str| -> Result<(), CoercionError> {
                let items = decode_collection(cell, &splitter, |token| {
                    let mut nested = <C::Item as Default>::default();
                    inner.apply(&mut nested, token)?;
                    Ok(nested)
                })?;
                set(record, C::from_items(items));
                Ok(())
            },
        );
        self.push(column, field, kind, apply)
    }

    fn finish(self) -> Result<Vec<ColumnBinding<T>>, SchemaError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.bindings),
        }
    }
}

thread_local! {
    /// Nested record types whose bindings are being built on this thread.
    static NESTING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

struct NestingGuard;

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTING.with(|stack| stack.borrow_mut().pop());
    }
}

/// Builds the bindings of a nested element type. A type reached again while
/// its own bindings are still being built would never finish, so it fails.
fn nested_bindings<N: CsvRecord>() -> Result<Vec<ColumnBinding<N>>, SchemaError> {
    let id = TypeId::of::<N>();
    let entered = NESTING.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.contains(&id) {
            return false;
        }
        stack.push(id);
        true
    });
    if !entered {
        return Err(SchemaError::RecursiveNesting {
            type_name: std::any::type_name::<N>(),
        });
    }
    let _guard = NestingGuard;
    N::columns(Columns::new()).finish()
}

/// A type that rows can be decoded into.
pub trait CsvRecord: Default + Send + Sync + Sized + 'static {
    /// Source path and delimiter. Types that only appear as nested collection
    /// elements may leave this undeclared.
    fn table() -> Option<TableConfig> {
        None
    }

    fn columns(columns: Columns<Self>) -> Columns<Self>;
}

/// Table configuration plus the ordered bindings of one target type.
pub struct Schema<T> {
    path: PathBuf,
    delimiter: Delimiter,
    splitter: Splitter,
    bindings: Vec<ColumnBinding<T>>,
}

impl<T: CsvRecord> Schema<T> {
    /// Validates `T`'s declaration. Nothing is cached: each call re-reads it.
    pub fn resolve() -> Result<Self, SchemaError> {
        let type_name = std::any::type_name::<T>();
        let table = T::table().ok_or(SchemaError::MissingTableConfig { type_name })?;
        let path = table
            .path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(SchemaError::MissingPath { type_name })?;
        let delimiter = table
            .delimiter
            .filter(|d| !d.is_empty())
            .ok_or(SchemaError::MissingDelimiter { type_name })?;
        let splitter = Splitter::compile(&delimiter)?;
        let bindings = T::columns(Columns::new()).finish()?;

        debug!(
            target_type = type_name,
            path = %path.display(),
            delimiter = %delimiter,
            bindings = bindings.len(),
            "resolved schema"
        );

        Ok(Self {
            path,
            delimiter,
            splitter,
            bindings,
        })
    }
}

impl<T> Schema<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    pub fn bindings(&self) -> &[ColumnBinding<T>] {
        &self.bindings
    }

    /// Resolves a header line with this schema's delimiter.
    pub fn header_index(&self, line: &str) -> HeaderIndex {
        HeaderIndex::parse(line, &self.splitter)
    }

    pub(crate) fn splitter(&self) -> &Splitter {
        &self.splitter
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("path", &self.path)
            .field("delimiter", &self.delimiter)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<T> PartialEq for Schema<T> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.delimiter == other.delimiter
            && self.bindings == other.bindings
    }
}
