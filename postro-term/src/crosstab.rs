//! `\crosstabview`: show a three column result as a grid.
//!
//! One column gives the row headers, another the column headers, a third the cells. Headers
//! keep the order they first appear in, unless a sort column ranks the column headers by its
//! integer values.
use std::collections::HashMap;

use postro_wire::postgres::oid;

use crate::{
    print::{Align, PrintOptions, Table},
    result::{PgResult, ResultStatus},
    scan::slash::dequote_identifier,
};

/// Most columns a grid can have, as in a table.
const MAX_COLUMNS: usize = 1600;

/// Build the grid of `result`.
///
/// `args` are the up to four column arguments: row headers, column headers, cells and the
/// column sorting the column headers, each a 1-based number or a name.
pub fn pivot(result: &PgResult, args: &[String], opt: &PrintOptions) -> Result<Table, String> {
    if result.status != ResultStatus::TuplesOk {
        return Err("statement did not return a result set".into());
    }
    let nfields = result.nfields();
    if nfields < 3 {
        return Err("query must return at least three columns".into());
    }

    let arg = |i: usize| args.get(i).map(String::as_str);
    let row_col = match arg(0) {
        Some(column_arg) => column_index(result, column_arg)?,
        None => 0,
    };
    let head_col = match arg(1) {
        Some(column_arg) => column_index(result, column_arg)?,
        None => 1,
    };
    if row_col == head_col {
        return Err("vertical and horizontal headers must be different columns".into());
    }
    let data_col = match arg(2) {
        Some(column_arg) => column_index(result, column_arg)?,
        None if nfields == 3 => (0..3).find(|i| *i != row_col && *i != head_col).unwrap_or(2),
        None => {
            return Err("data column must be specified when query returns more than three columns".into());
        }
    };
    let sort_col = arg(3).map(|column_arg| column_index(result, column_arg)).transpose()?;

    let mut rows = Headers::default();
    let mut heads = Headers::default();
    let mut sort_values: Vec<i64> = vec![];
    let mut cells: HashMap<(usize, usize), Option<&str>> = HashMap::new();

    for n in 0..result.ntuples() {
        let r = rows.index(result.value(n, row_col));
        let before = heads.values.len();
        let h = heads.index(result.value(n, head_col));
        if heads.values.len() > MAX_COLUMNS {
            return Err(format!("maximum number of columns ({MAX_COLUMNS}) exceeded"));
        }
        if heads.values.len() > before {
            sort_values.push(sort_col.map(|c| sort_rank(result.value(n, c))).unwrap_or(0));
        }
        if cells.insert((r, h), result.value(n, data_col)).is_some() {
            return Err(format!(
                "query result contains multiple data values for row \"{}\", column \"{}\"",
                result.value(n, row_col).unwrap_or("(null)"),
                result.value(n, head_col).unwrap_or("(null)"),
            ));
        }
    }

    // display position of each column header
    let mut order: Vec<usize> = (0..heads.values.len()).collect();
    if sort_col.is_some() {
        order.sort_by_key(|&h| sort_values[h]);
    }

    let null = |value: Option<&str>| value.map_or_else(|| opt.null_print.clone(), str::to_owned);
    let mut table = Table::new(opt.title.clone());
    table.add_header(&result.columns[row_col].name, column_align(result, row_col));
    let data_align = column_align(result, data_col);
    for &h in &order {
        table.add_header(null(heads.values[h]), data_align);
    }
    for (r, value) in rows.values.iter().enumerate() {
        let mut row = Vec::with_capacity(order.len() + 1);
        row.push(null(*value));
        for &h in &order {
            row.push(match cells.get(&(r, h)) {
                Some(value) => null(*value),
                None => String::new(),
            });
        }
        table.add_row(row);
    }
    Ok(table)
}

/// Distinct header values in order of appearance, NULL included.
#[derive(Default)]
struct Headers<'a> {
    values: Vec<Option<&'a str>>,
    index: HashMap<Option<&'a str>, usize>,
}

impl<'a> Headers<'a> {
    fn index(&mut self, value: Option<&'a str>) -> usize {
        *self.index.entry(value).or_insert_with(|| {
            self.values.push(value);
            self.values.len() - 1
        })
    }
}

/// Integer rank of a sort column value, anything else ranks as 0.
fn sort_rank(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

fn column_align(result: &PgResult, col: usize) -> Align {
    match oid::is_numeric(result.columns[col].type_oid) {
        true => Align::Right,
        false => Align::Left,
    }
}

/// Column by 1-based number, or by name with unquoted letters folded to lower case.
fn column_index(result: &PgResult, column_arg: &str) -> Result<usize, String> {
    let nfields = result.nfields();
    if !column_arg.is_empty() && column_arg.bytes().all(|b| b.is_ascii_digit()) {
        return match column_arg.parse::<usize>() {
            Ok(n) if (1..=nfields).contains(&n) => Ok(n - 1),
            _ => Err(format!("column number {column_arg} is out of range 1..{nfields}")),
        };
    }

    let name = dequote_identifier(column_arg);
    let mut found = None;
    for (i, column) in result.columns.iter().enumerate() {
        if column.name == name {
            if found.is_some() {
                return Err(format!("ambiguous column name: \"{column_arg}\""));
            }
            found = Some(i);
        }
    }
    found.ok_or_else(|| format!("column name not found: \"{column_arg}\""))
}

#[cfg(test)]
mod test {
    use super::*;

    fn sales() -> PgResult {
        let row = |v: &str, h: &str, d: &str, s: &str| {
            vec![Some(v.to_owned()), Some(h.to_owned()), Some(d.to_owned()), Some(s.to_owned())]
        };
        PgResult::from_text(&["region", "Month", "total", "month_no"], vec![
            row("north", "feb", "20", "2"),
            row("north", "jan", "10", "1"),
            row("south", "jan", "30", "1"),
        ])
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn grid() {
        let table = pivot(&sales(), &args(&["1", "\"Month\"", "total"]), &PrintOptions::default()).unwrap();
        assert_eq!(table.headers, ["region", "feb", "jan"]);
        assert_eq!(table.rows, [vec!["north", "20", "10"], vec!["south", "", "30"]]);
    }

    #[test]
    fn sorted_headers() {
        let table = pivot(&sales(), &args(&["region", "2", "3", "month_no"]), &PrintOptions::default()).unwrap();
        assert_eq!(table.headers, ["region", "jan", "feb"]);
        assert_eq!(table.rows[0], ["north", "10", "20"]);
    }

    #[test]
    fn three_columns_default() {
        let result = PgResult::from_text(&["a", "b", "c"], vec![
            vec![Some("x".into()), None, Some("1".into())],
        ]);
        let opt = PrintOptions { null_print: "-".into(), ..Default::default() };
        let table = pivot(&result, &[], &opt).unwrap();
        assert_eq!(table.headers, ["a", "-"]);
        assert_eq!(table.rows, [vec!["x", "1"]]);
    }

    #[test]
    fn errors() {
        let opt = PrintOptions::default();
        let err = |list: &[&str]| pivot(&sales(), &args(list), &opt).unwrap_err();
        assert_eq!(err(&[]), "data column must be specified when query returns more than three columns");
        assert_eq!(err(&["1", "1", "3"]), "vertical and horizontal headers must be different columns");
        assert_eq!(err(&["5"]), "column number 5 is out of range 1..4");
        assert_eq!(err(&["month"]), "column name not found: \"month\"");

        let twice = PgResult::from_text(&["a", "b", "c"], vec![
            vec![Some("x".into()), Some("y".into()), Some("1".into())],
            vec![Some("x".into()), Some("y".into()), Some("2".into())],
        ]);
        assert_eq!(
            pivot(&twice, &[], &opt).unwrap_err(),
            "query result contains multiple data values for row \"x\", column \"y\""
        );

        let narrow = PgResult::from_text(&["a", "b"], vec![]);
        assert_eq!(pivot(&narrow, &[], &opt).unwrap_err(), "query must return at least three columns");
    }
}
