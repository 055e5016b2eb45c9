//! Ordered column layouts.
//!
//! A [`Schema`] turns the raw tokens of one record into one [`Value`] per
//! logical (non-ignored) column, and back.

use std::sync::Arc;

use crate::codec::{ColumnContext, RecordContext};
use crate::column::ColumnDefinition;
use crate::error::{ColumnError, RecordError};
use crate::value::Value;

/// Physical column layout of a record.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Arc<dyn ColumnDefinition>>,
    logical_count: usize,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Arc<dyn ColumnDefinition>>) -> Self {
        let logical_count = columns.iter().filter(|c| !c.is_ignored()).count();
        Self {
            columns,
            logical_count,
        }
    }

    pub fn add_column(&mut self, column: Arc<dyn ColumnDefinition>) {
        if !column.is_ignored() {
            self.logical_count += 1;
        }
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[Arc<dyn ColumnDefinition>] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn physical_count(&self) -> usize {
        self.columns.len()
    }

    pub fn logical_count(&self) -> usize {
        self.logical_count
    }

    /// Parse the raw tokens of a record into logical values.
    pub fn parse_record(&self, ctx: &RecordContext, raw: &[String]) -> Result<Vec<Value>, RecordError> {
        self.check_width(ctx, raw.len())?;

        let mut values = Vec::with_capacity(self.logical_count);
        for (physical, (column, token)) in self.columns.iter().zip(raw).enumerate() {
            if column.is_ignored() {
                continue;
            }
            let logical = values.len();
            let column_ctx = ColumnContext::new(ctx, column.name(), physical, logical);
            let value = column
                .parse(&column_ctx, token)
                .map_err(|source| column_error(ctx, column.as_ref(), physical, logical, source))?;
            values.push(value);
        }
        Ok(values)
    }

    /// Format logical values into one token per physical column. Ignored
    /// columns receive an empty token.
    pub fn format_record(&self, ctx: &RecordContext, values: &[Value]) -> Result<Vec<String>, RecordError> {
        if values.len() != self.logical_count {
            return Err(RecordError::ColumnCountMismatch {
                record: ctx.logical_record_number(),
                expected: self.logical_count,
                actual: values.len(),
            });
        }

        let mut tokens = Vec::with_capacity(self.columns.len());
        let mut logical = 0;
        for (physical, column) in self.columns.iter().enumerate() {
            if column.is_ignored() {
                tokens.push(String::new());
                continue;
            }
            let column_ctx = ColumnContext::new(ctx, column.name(), physical, logical);
            let token = column
                .format(&column_ctx, &values[logical])
                .map_err(|source| column_error(ctx, column.as_ref(), physical, logical, source))?;
            tokens.push(token);
            logical += 1;
        }
        Ok(tokens)
    }

    fn check_width(&self, ctx: &RecordContext, actual: usize) -> Result<(), RecordError> {
        if actual != self.columns.len() {
            return Err(RecordError::ColumnCountMismatch {
                record: ctx.physical_record_number(),
                expected: self.columns.len(),
                actual,
            });
        }
        Ok(())
    }
}

fn column_error(
    ctx: &RecordContext,
    column: &dyn ColumnDefinition,
    physical: usize,
    logical: usize,
    source: crate::error::ValueError,
) -> RecordError {
    RecordError::Column(ColumnError {
        record: ctx.physical_record_number(),
        column: column.name().to_string(),
        physical_index: physical,
        logical_index: Some(logical),
        source,
    })
}
