//! Field catalog: the persisted fields of a record type.
//!
//! The catalog is reflected from the sea-orm column enumeration the first time a record type
//! is asked for and kept for the lifetime of the process. Every other component of the crate
//! validates names, values and literals against it.
use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    str::FromStr,
    sync::{OnceLock, PoisonError, RwLock},
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sea_orm::{
    ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable, PrimaryKeyToColumn, Value,
    prelude::Decimal,
};

use crate::{LedgerError, Record, ResultLedger};

const LITERAL_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const LITERAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Primitive type of a persisted field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    Enum,
    Timestamp,
    Date,
    Other,
}

impl FieldKind {
    /// Whether values of this kind can bound a date range.
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Timestamp | Self::Date)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Exact storage variant of a column. `ActiveModel::set` panics on a variant mismatch, so
/// every value is converted to this before it reaches sea-orm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repr {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    String,
    Bool,
    DateTimeUtc,
    NaiveDateTime,
    Date,
    Passthrough,
}

impl Repr {
    fn of(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::TinyInteger => Self::I8,
            ColumnType::SmallInteger => Self::I16,
            ColumnType::Integer => Self::I32,
            ColumnType::BigInteger => Self::I64,
            ColumnType::TinyUnsigned => Self::U8,
            ColumnType::SmallUnsigned => Self::U16,
            ColumnType::Unsigned => Self::U32,
            ColumnType::BigUnsigned => Self::U64,
            ColumnType::Float => Self::F32,
            ColumnType::Double => Self::F64,
            ColumnType::Decimal(_) | ColumnType::Money(_) => Self::Decimal,
            ColumnType::Char(_)
            | ColumnType::String(_)
            | ColumnType::Text
            | ColumnType::Enum { .. } => Self::String,
            ColumnType::Boolean => Self::Bool,
            ColumnType::TimestampWithTimeZone => Self::DateTimeUtc,
            ColumnType::DateTime | ColumnType::Timestamp => Self::NaiveDateTime,
            ColumnType::Date => Self::Date,
            _ => Self::Passthrough,
        }
    }

    fn null(self) -> Value {
        match self {
            Self::I8 => Value::TinyInt(None),
            Self::I16 => Value::SmallInt(None),
            Self::I32 => Value::Int(None),
            Self::I64 => Value::BigInt(None),
            Self::U8 => Value::TinyUnsigned(None),
            Self::U16 => Value::SmallUnsigned(None),
            Self::U32 => Value::Unsigned(None),
            Self::U64 => Value::BigUnsigned(None),
            Self::F32 => Value::Float(None),
            Self::F64 => Value::Double(None),
            Self::Decimal => Value::Decimal(None),
            Self::String | Self::Passthrough => Value::String(None),
            Self::Bool => Value::Bool(None),
            Self::DateTimeUtc => Value::ChronoDateTimeUtc(None),
            Self::NaiveDateTime => Value::ChronoDateTime(None),
            Self::Date => Value::ChronoDate(None),
        }
    }

    fn integer(self, n: i128) -> Option<Value> {
        let value = match self {
            Self::I8 => Value::from(i8::try_from(n).ok()?),
            Self::I16 => Value::from(i16::try_from(n).ok()?),
            Self::I32 => Value::from(i32::try_from(n).ok()?),
            Self::I64 => Value::from(i64::try_from(n).ok()?),
            Self::U8 => Value::from(u8::try_from(n).ok()?),
            Self::U16 => Value::from(u16::try_from(n).ok()?),
            Self::U32 => Value::from(u32::try_from(n).ok()?),
            Self::U64 => Value::from(u64::try_from(n).ok()?),
            _ => return None,
        };
        Some(value)
    }

    fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    fn convert(self, value: Value) -> Option<Value> {
        if self.is_integer() {
            return integer_of(&value).and_then(|n| self.integer(n));
        }
        match (self, value) {
            (Self::F32, value) => float_of(&value).map(|f| Value::from(f as f32)),
            (Self::F64, value) => float_of(&value).map(Value::from),
            (Self::Decimal, Value::Decimal(Some(d))) => Some(Value::Decimal(Some(d))),
            (Self::Decimal, value) => integer_of(&value)
                .and_then(|n| i64::try_from(n).ok())
                .map(|n| Value::from(Decimal::from(n))),
            (Self::String, Value::String(Some(s))) => Some(Value::String(Some(s))),
            (Self::String, Value::Char(Some(c))) => Some(Value::from(c.to_string())),
            (Self::Bool, Value::Bool(Some(b))) => Some(Value::from(b)),
            (Self::DateTimeUtc, Value::ChronoDateTimeUtc(Some(dt))) => {
                Some(Value::ChronoDateTimeUtc(Some(dt)))
            }
            (Self::DateTimeUtc, Value::ChronoDateTimeWithTimeZone(Some(dt))) => {
                Some(Value::from(dt.with_timezone(&Utc)))
            }
            (Self::NaiveDateTime, Value::ChronoDateTime(Some(dt))) => {
                Some(Value::ChronoDateTime(Some(dt)))
            }
            (Self::NaiveDateTime, Value::ChronoDateTimeUtc(Some(dt))) => {
                Some(Value::from(dt.naive_utc()))
            }
            (Self::Date, Value::ChronoDate(Some(d))) => Some(Value::ChronoDate(Some(d))),
            (Self::Passthrough, value) => Some(value),
            _ => None,
        }
    }

    fn parse(self, raw: &str) -> Option<Value> {
        if self.is_integer() {
            return raw.parse::<i128>().ok().and_then(|n| self.integer(n));
        }
        match self {
            Self::F32 => raw.parse::<f32>().ok().map(Value::from),
            Self::F64 => raw.parse::<f64>().ok().map(Value::from),
            Self::Decimal => Decimal::from_str(raw).ok().map(Value::from),
            Self::String | Self::Passthrough => Some(Value::from(unquote(raw).to_string())),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::from(true)),
                "false" | "0" => Some(Value::from(false)),
                _ => None,
            },
            Self::DateTimeUtc => parse_utc(raw).map(Value::from),
            Self::NaiveDateTime => parse_naive(raw).map(Value::from),
            Self::Date => NaiveDate::parse_from_str(raw, LITERAL_DATE_FORMAT)
                .ok()
                .map(Value::from),
            _ => None,
        }
    }
}

pub(crate) fn integer_of(value: &Value) -> Option<i128> {
    match value {
        Value::TinyInt(Some(n)) => Some(i128::from(*n)),
        Value::SmallInt(Some(n)) => Some(i128::from(*n)),
        Value::Int(Some(n)) => Some(i128::from(*n)),
        Value::BigInt(Some(n)) => Some(i128::from(*n)),
        Value::TinyUnsigned(Some(n)) => Some(i128::from(*n)),
        Value::SmallUnsigned(Some(n)) => Some(i128::from(*n)),
        Value::Unsigned(Some(n)) => Some(i128::from(*n)),
        Value::BigUnsigned(Some(n)) => Some(i128::from(*n)),
        _ => None,
    }
}

fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(f)) => Some(f64::from(*f)),
        Value::Double(Some(f)) => Some(*f),
        other => integer_of(other).map(|n| n as f64),
    }
}

fn unquote(raw: &str) -> &str {
    ['\'', '"']
        .iter()
        .find_map(|quote| {
            raw.strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(raw)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    LITERAL_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, LITERAL_DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive(raw).map(|naive| naive.and_utc()))
}

/// Name of the variant carried by a value, used in error messages.
pub(crate) fn value_kind(value: &Value) -> String {
    let debug = format!("{value:?}");
    debug
        .split_once('(')
        .map_or(debug.clone(), |(variant, _)| variant.to_string())
}

/// Static metadata about one persisted attribute of a record type.
#[derive(Clone, Debug)]
pub struct FieldDescriptor<E: EntityTrait> {
    name: String,
    column: E::Column,
    column_type: ColumnType,
    kind: FieldKind,
    nullable: bool,
    primary_key: bool,
}

impl<E: EntityTrait> FieldDescriptor<E> {
    fn reflect(column: E::Column, primary_key: bool) -> Self {
        let def = column.def();
        let column_type = def.get_column_type().clone();
        let kind = match &column_type {
            ColumnType::Enum { .. } => FieldKind::Enum,
            other => match Repr::of(other) {
                r if r.is_integer() => FieldKind::Integer,
                Repr::F32 | Repr::F64 => FieldKind::Float,
                Repr::Decimal => FieldKind::Decimal,
                Repr::String => FieldKind::Text,
                Repr::Bool => FieldKind::Boolean,
                Repr::DateTimeUtc | Repr::NaiveDateTime => FieldKind::Timestamp,
                Repr::Date => FieldKind::Date,
                _ => FieldKind::Other,
            },
        };
        Self {
            name: column.as_str().to_string(),
            column,
            nullable: def.is_null(),
            column_type,
            kind,
            primary_key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sea-orm column handle of the field.
    pub fn column(&self) -> E::Column {
        self.column
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether the field stores a timezone aware timestamp.
    pub(crate) fn is_utc_timestamp(&self) -> bool {
        Repr::of(&self.column_type) == Repr::DateTimeUtc
    }

    /// Whether the field stores a calendar date without a time.
    pub(crate) fn is_date(&self) -> bool {
        Repr::of(&self.column_type) == Repr::Date
    }

    /// Converts `value` to the exact storage variant of the field.
    ///
    /// Integers are narrowed or widened when they fit, aware timestamps are normalized to
    /// UTC and `NULL` is accepted only by nullable fields.
    pub fn coerce(&self, value: Value) -> ResultLedger<Value> {
        let repr = Repr::of(&self.column_type);
        if value == value.as_null() {
            return if self.nullable {
                Ok(repr.null())
            } else {
                Err(self.mismatch(&value))
            };
        }
        let found = value_kind(&value);
        repr.convert(value)
            .filter(|converted| self.admits(converted))
            .ok_or_else(|| LedgerError::InvalidArgumentType {
                table: table_name::<E>(),
                field: self.name.clone(),
                expected: self.kind,
                found,
            })
    }

    /// Parses a textual literal, as found in a filter expression, into a value of the field's
    /// type. Returns `None` when the text is not a valid literal for the field.
    pub fn parse_literal(&self, raw: &str) -> Option<Value> {
        Repr::of(&self.column_type)
            .parse(raw.trim())
            .filter(|value| self.admits(value))
    }

    /// Enum fields only accept one of their declared variants.
    fn admits(&self, value: &Value) -> bool {
        match (&self.column_type, value) {
            (ColumnType::Enum { variants, .. }, Value::String(Some(s))) => variants
                .iter()
                .any(|variant| variant.to_string() == s.as_str()),
            _ => true,
        }
    }

    fn mismatch(&self, value: &Value) -> LedgerError {
        LedgerError::InvalidArgumentType {
            table: table_name::<E>(),
            field: self.name.clone(),
            expected: self.kind,
            found: value_kind(value),
        }
    }
}

/// All the persisted fields of a record type, in declaration order.
#[derive(Debug)]
pub struct FieldCatalog<E: EntityTrait> {
    table: String,
    fields: Vec<FieldDescriptor<E>>,
}

impl<E: EntityTrait> FieldCatalog<E> {
    fn reflect() -> Self {
        let primary_keys: Vec<String> = E::PrimaryKey::iter()
            .map(|key| key.into_column().as_str().to_string())
            .collect();
        let fields = E::Column::iter()
            .map(|column| {
                let primary_key = primary_keys.iter().any(|key| key == column.as_str());
                FieldDescriptor::reflect(column, primary_key)
            })
            .collect();
        Self {
            table: table_name::<E>(),
            fields,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks up a field, failing with [`LedgerError::InvalidAttribute`] when unknown.
    pub fn resolve(&self, name: &str) -> ResultLedger<&FieldDescriptor<E>> {
        self.get(name).ok_or_else(|| LedgerError::InvalidAttribute {
            table: self.table.clone(),
            field: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor<E>> {
        self.fields.iter()
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// The single primary key column. Composite keys are not supported by the managers.
    pub fn primary_key(&self) -> ResultLedger<&FieldDescriptor<E>> {
        let mut keys = self.fields.iter().filter(|field| field.primary_key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key),
            _ => Err(LedgerError::MissingPrimaryKey(self.table.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

type Registry = RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>;

static CATALOGS: OnceLock<Registry> = OnceLock::new();

/// Returns the catalog of `E`, reflecting it on first use.
pub fn catalog<E: Record>() -> &'static FieldCatalog<E> {
    let registry = CATALOGS.get_or_init(Default::default);
    let key = TypeId::of::<E>();

    let cached = registry
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .copied();
    if let Some(catalog) = cached.and_then(|any| any.downcast_ref::<FieldCatalog<E>>()) {
        return catalog;
    }

    let mut registry = registry.write().unwrap_or_else(PoisonError::into_inner);
    let raced = registry
        .get(&key)
        .copied()
        .and_then(|any| any.downcast_ref::<FieldCatalog<E>>());
    if let Some(catalog) = raced {
        return catalog;
    }

    let catalog: &'static FieldCatalog<E> = Box::leak(Box::new(FieldCatalog::reflect()));
    tracing::debug!(
        table = catalog.table(),
        fields = catalog.len(),
        "reflected field catalog"
    );
    registry.insert(key, catalog);
    catalog
}

/// Name → descriptor map of the persisted fields of `E`.
pub fn fields<E: Record>() -> BTreeMap<&'static str, &'static FieldDescriptor<E>> {
    catalog::<E>()
        .iter()
        .map(|field| (field.name(), field))
        .collect()
}

/// Names of the persisted fields of `E`.
pub fn fieldnames<E: Record>() -> BTreeSet<&'static str> {
    catalog::<E>().names()
}

pub(crate) fn table_name<E: EntityTrait>() -> String {
    E::default().table_name().to_string()
}
