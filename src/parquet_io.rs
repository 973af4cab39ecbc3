//! Flat Parquet tables: one row group, required/optional primitive columns.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::{Field, Row};
use parquet::schema::parser::parse_message_type;

#[derive(Debug, Clone)]
pub enum ColumnData {
    Utf8(Vec<String>),
    OptUtf8(Vec<Option<String>>),
    Double(Vec<f64>),
    OptDouble(Vec<Option<f64>>),
    Int64(Vec<i64>),
    OptInt64(Vec<Option<i64>>),
    Bool(Vec<bool>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::OptUtf8(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::OptDouble(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::OptInt64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    fn schema_line(&self, name: &str) -> String {
        match self {
            ColumnData::Utf8(_) => format!("REQUIRED BYTE_ARRAY {name} (UTF8);"),
            ColumnData::OptUtf8(_) => format!("OPTIONAL BYTE_ARRAY {name} (UTF8);"),
            ColumnData::Double(_) => format!("REQUIRED DOUBLE {name};"),
            ColumnData::OptDouble(_) => format!("OPTIONAL DOUBLE {name};"),
            ColumnData::Int64(_) => format!("REQUIRED INT64 {name};"),
            ColumnData::OptInt64(_) => format!("OPTIONAL INT64 {name};"),
            ColumnData::Bool(_) => format!("REQUIRED BOOLEAN {name};"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Writes `columns` as a single-row-group Parquet file. Column names must be
/// plain identifiers; all columns must have the same length.
pub fn write_table(path: &Path, table_name: &str, columns: &[Column]) -> Result<usize> {
    let Some(first) = columns.first() else {
        return Err(anyhow!("refusing to write table {table_name} without columns"));
    };
    let rows = first.data.len();
    if let Some(bad) = columns.iter().find(|c| c.data.len() != rows) {
        return Err(anyhow!(
            "column {} has {} rows, expected {rows}",
            bad.name,
            bad.data.len()
        ));
    }

    let mut message = format!("message {table_name} {{\n");
    for column in columns {
        message.push_str("  ");
        message.push_str(&column.data.schema_line(&column.name));
        message.push('\n');
    }
    message.push('}');
    let schema = Arc::new(parse_message_type(&message).context("parse parquet schema")?);
    let props = Arc::new(WriterProperties::builder().build());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let tmp = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    let mut writer =
        SerializedFileWriter::new(file, schema, props).context("open parquet writer")?;
    let mut row_group = writer.next_row_group().context("open row group")?;

    let mut idx = 0usize;
    while let Some(mut col_writer) = row_group.next_column().context("next column")? {
        let column = columns
            .get(idx)
            .ok_or_else(|| anyhow!("schema has more columns than data"))?;
        match &column.data {
            ColumnData::Utf8(values) => {
                let bytes: Vec<ByteArray> = values.iter().map(|s| ByteArray::from(s.as_str())).collect();
                col_writer.typed::<ByteArrayType>().write_batch(&bytes, None, None)?;
            }
            ColumnData::OptUtf8(values) => {
                let defs: Vec<i16> = values.iter().map(|v| i16::from(v.is_some())).collect();
                let bytes: Vec<ByteArray> = values
                    .iter()
                    .flatten()
                    .map(|s| ByteArray::from(s.as_str()))
                    .collect();
                col_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&bytes, Some(&defs), None)?;
            }
            ColumnData::Double(values) => {
                col_writer.typed::<DoubleType>().write_batch(values, None, None)?;
            }
            ColumnData::OptDouble(values) => {
                let defs: Vec<i16> = values.iter().map(|v| i16::from(v.is_some())).collect();
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                col_writer
                    .typed::<DoubleType>()
                    .write_batch(&present, Some(&defs), None)?;
            }
            ColumnData::Int64(values) => {
                col_writer.typed::<Int64Type>().write_batch(values, None, None)?;
            }
            ColumnData::OptInt64(values) => {
                let defs: Vec<i16> = values.iter().map(|v| i16::from(v.is_some())).collect();
                let present: Vec<i64> = values.iter().flatten().copied().collect();
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&present, Some(&defs), None)?;
            }
            ColumnData::Bool(values) => {
                col_writer.typed::<BoolType>().write_batch(values, None, None)?;
            }
        }
        col_writer
            .close()
            .with_context(|| format!("close column {}", column.name))?;
        idx += 1;
    }
    row_group.close().context("close row group")?;
    writer.close().context("close parquet writer")?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(rows)
}

pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file)
        .with_context(|| format!("open parquet reader {}", path.display()))?;
    let iter = reader.get_row_iter(None).context("iterate parquet rows")?;
    let mut out = Vec::new();
    for row in iter {
        out.push(row.with_context(|| format!("decode row in {}", path.display()))?);
    }
    Ok(out)
}

pub fn field<'a>(row: &'a Row, name: &str) -> Option<&'a Field> {
    row.get_column_iter()
        .find(|(col, _)| col.as_str() == name)
        .map(|(_, f)| f)
}

pub fn field_str(row: &Row, name: &str) -> Option<String> {
    match field(row, name)? {
        Field::Str(s) => Some(s.clone()),
        Field::Null => None,
        other => Some(other.to_string()),
    }
}

pub fn field_f64(row: &Row, name: &str) -> Option<f64> {
    field_as_f64(field(row, name)?)
}

pub fn field_as_f64(f: &Field) -> Option<f64> {
    match f {
        Field::Double(v) => Some(*v),
        Field::Float(v) => Some(f64::from(*v)),
        Field::Long(v) => Some(*v as f64),
        Field::Int(v) => Some(f64::from(*v)),
        Field::Short(v) => Some(f64::from(*v)),
        Field::Byte(v) => Some(f64::from(*v)),
        Field::ULong(v) => Some(*v as f64),
        Field::UInt(v) => Some(f64::from(*v)),
        Field::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        Field::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn field_i64(row: &Row, name: &str) -> Option<i64> {
    match field(row, name)? {
        Field::Long(v) => Some(*v),
        Field::Int(v) => Some(i64::from(*v)),
        Field::Short(v) => Some(i64::from(*v)),
        Field::UInt(v) => Some(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).ok(),
        Field::Str(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn field_bool(row: &Row, name: &str) -> Option<bool> {
    match field(row, name)? {
        Field::Bool(v) => Some(*v),
        Field::Long(v) => Some(*v != 0),
        Field::Int(v) => Some(*v != 0),
        Field::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
