//! Materialized query results.
//!
//! Every value arrives in text format and is kept as a lossily decoded string, `None` for
//! NULL. A [`PgResult`] is turned into a printable [`Table`] with [`PgResult::to_table`].
use postro_wire::{
    ServerNotice,
    postgres::{Oid, backend::FieldDescription, oid},
};

use crate::print::{Align, PrintOptions, Table, format_numeric_locale};

/// What a result is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    EmptyQuery,
    /// A command that returns no rows.
    CommandOk,
    TuplesOk,
    CopyIn,
    CopyOut,
    FatalError,
    /// A pipeline synchronization point.
    PipelineSync,
    /// A command skipped because an earlier command of the pipeline failed.
    PipelineAborted,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "PGRES_EMPTY_QUERY",
            Self::CommandOk => "PGRES_COMMAND_OK",
            Self::TuplesOk => "PGRES_TUPLES_OK",
            Self::CopyIn => "PGRES_COPY_IN",
            Self::CopyOut => "PGRES_COPY_OUT",
            Self::FatalError => "PGRES_FATAL_ERROR",
            Self::PipelineSync => "PGRES_PIPELINE_SYNC",
            Self::PipelineAborted => "PGRES_PIPELINE_ABORTED",
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::FatalError | Self::PipelineAborted)
    }
}

/// Result column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_oid: Oid,
    pub type_modifier: i32,
    pub table_oid: Oid,
    pub column_attr: i16,
}

impl From<FieldDescription> for Column {
    fn from(field: FieldDescription) -> Self {
        Column {
            name: field.name,
            type_oid: field.type_oid,
            type_modifier: field.type_modifier,
            table_oid: field.table_oid,
            column_attr: field.column_attr,
        }
    }
}

/// One result of a query.
#[derive(Debug, Clone)]
pub struct PgResult {
    pub status: ResultStatus,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Command tag, e.g. `INSERT 0 1`.
    pub tag: String,
    pub error: Option<ServerNotice>,
}

impl PgResult {
    pub fn new(status: ResultStatus) -> PgResult {
        PgResult { status, columns: vec![], rows: vec![], tag: String::new(), error: None }
    }

    pub fn with_columns(columns: Vec<Column>) -> PgResult {
        PgResult { columns, ..PgResult::new(ResultStatus::TuplesOk) }
    }

    pub fn from_error(notice: ServerNotice) -> PgResult {
        PgResult { error: Some(notice), ..PgResult::new(ResultStatus::FatalError) }
    }

    /// Result with the given text columns and rows, for results built on the client.
    pub fn from_text(headers: &[&str], rows: Vec<Vec<Option<String>>>) -> PgResult {
        let columns = headers
            .iter()
            .map(|name| Column {
                name: name.to_string(),
                type_oid: oid::TEXT,
                type_modifier: -1,
                table_oid: 0,
                column_attr: 0,
            })
            .collect();
        PgResult { rows, ..PgResult::with_columns(columns) }
    }

    pub fn ntuples(&self) -> usize {
        self.rows.len()
    }

    pub fn nfields(&self) -> usize {
        self.columns.len()
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Value, with NULL as an empty string.
    pub fn get(&self, row: usize, col: usize) -> &str {
        self.value(row, col).unwrap_or_default()
    }

    pub fn is_null(&self, row: usize, col: usize) -> bool {
        self.value(row, col).is_none()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Rows affected, as reported by the command tag.
    pub fn affected_rows(&self) -> Option<u64> {
        let mut words = self.tag.split_whitespace();
        let command = words.next()?;
        let rows = words.next()?;
        match command {
            "INSERT" => words.next()?,
            "SELECT" | "UPDATE" | "DELETE" | "MERGE" | "FETCH" | "MOVE" | "COPY" => rows,
            _ => return None,
        }
        .parse()
        .ok()
    }

    /// Row count stored in `ROW_COUNT`.
    pub fn row_count(&self) -> u64 {
        match self.status {
            ResultStatus::TuplesOk => self.affected_rows().unwrap_or(self.rows.len() as u64),
            _ => self.affected_rows().unwrap_or(0),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Printable table, NULLs shown as `null_print`, numbers right aligned and locale
    /// formatted when asked to.
    pub fn to_table(&self, opt: &PrintOptions, title: Option<String>) -> Table {
        let mut table = Table::new(title);
        let mut numeric = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let is_numeric = oid::is_numeric(col.type_oid);
            numeric.push(is_numeric);
            table.add_header(&col.name, if is_numeric { Align::Right } else { Align::Left });
        }
        for row in &self.rows {
            let cells = row
                .iter()
                .zip(&numeric)
                .map(|(value, &is_numeric)| match value {
                    None => opt.null_print.clone(),
                    Some(v) if is_numeric && opt.numeric_locale => format_numeric_locale(v),
                    Some(v) => v.clone(),
                })
                .collect();
            table.add_row(cells);
        }
        table
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> PgResult {
        let mut result = PgResult::with_columns(vec![
            Column { name: "n".into(), type_oid: oid::INT4, type_modifier: -1, table_oid: 0, column_attr: 0 },
            Column { name: "s".into(), type_oid: oid::TEXT, type_modifier: -1, table_oid: 0, column_attr: 0 },
        ]);
        result.rows.push(vec![Some("1234".into()), None]);
        result.rows.push(vec![None, Some("x".into())]);
        result.tag = "SELECT 2".into();
        result
    }

    #[test]
    fn table_conversion() {
        let opt = PrintOptions { null_print: "(null)".into(), numeric_locale: true, ..Default::default() };
        let table = sample().to_table(&opt, None);
        assert_eq!(table.headers, ["n", "s"]);
        assert_eq!(table.aligns, [Align::Right, Align::Left]);
        assert_eq!(table.rows[0], ["1,234", "(null)"]);
        assert_eq!(table.rows[1], ["(null)", "x"]);
    }

    #[test]
    fn counts_and_values() {
        let result = sample();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.value(0, 0), Some("1234"));
        assert!(result.is_null(0, 1));
        assert_eq!(result.get(0, 1), "");
        assert_eq!(result.column_index("s"), Some(1));

        let mut insert = PgResult::new(ResultStatus::CommandOk);
        insert.tag = "INSERT 0 3".into();
        assert_eq!(insert.row_count(), 3);
        insert.tag = "CREATE TABLE".into();
        assert_eq!(insert.row_count(), 0);
    }
}
