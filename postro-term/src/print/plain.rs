//! `unaligned` and `csv` formats.
use std::io::{self, Write};

use super::{PrintOptions, Table};

pub(super) fn print_unaligned_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let mut need_recordsep = false;

    if opt.start_table {
        if !opt.tuples_only {
            if let Some(title) = &table.title {
                out.write_all(title.as_bytes())?;
                opt.record_sep.write(out)?;
            }
            for (i, header) in table.headers.iter().enumerate() {
                if i > 0 {
                    opt.field_sep.write(out)?;
                }
                out.write_all(header.as_bytes())?;
            }
            need_recordsep = true;
        }
    } else {
        need_recordsep = true;
    }

    let ncol = table.ncolumns();
    for row in table.rows.iter().filter(|_| ncol > 0) {
        if need_recordsep {
            opt.record_sep.write(out)?;
        }
        for i in 0..ncol {
            if i > 0 {
                opt.field_sep.write(out)?;
            }
            out.write_all(row.get(i).map_or("", String::as_str).as_bytes())?;
        }
        need_recordsep = true;
    }

    if opt.stop_table {
        if let Some(footers) = table.footers_with_default(opt).filter(|_| !opt.tuples_only) {
            for footer in footers {
                if need_recordsep {
                    opt.record_sep.write(out)?;
                }
                out.write_all(footer.as_bytes())?;
                need_recordsep = true;
            }
        }
        // the last record ends with a newline whatever the separator, unless it is a zero byte
        if need_recordsep {
            if opt.record_sep.zero {
                opt.record_sep.write(out)?;
            } else {
                out.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

pub(super) fn print_unaligned_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let mut need_recordsep = false;

    if opt.start_table {
        if let Some(title) = table.title.as_ref().filter(|_| !opt.tuples_only) {
            out.write_all(title.as_bytes())?;
            need_recordsep = true;
        }
    } else {
        need_recordsep = true;
    }

    let ncol = table.ncolumns();
    for row in table.rows.iter().filter(|_| ncol > 0) {
        if need_recordsep {
            opt.record_sep.write(out)?;
            opt.record_sep.write(out)?;
        }
        for (i, header) in table.headers.iter().enumerate() {
            if i > 0 {
                opt.record_sep.write(out)?;
            }
            out.write_all(header.as_bytes())?;
            opt.field_sep.write(out)?;
            out.write_all(row.get(i).map_or("", String::as_str).as_bytes())?;
        }
        need_recordsep = true;
    }

    if opt.stop_table {
        if let Some(footers) = table.footers.as_ref().filter(|_| !opt.tuples_only) {
            opt.record_sep.write(out)?;
            for footer in footers {
                opt.record_sep.write(out)?;
                out.write_all(footer.as_bytes())?;
            }
        }
        if need_recordsep {
            if opt.record_sep.zero {
                opt.record_sep.write(out)?;
            } else {
                out.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

const CSV_EOL: &[u8] = b"\r\n";

fn csv_field(value: &str, sep: char, out: &mut dyn Write) -> io::Result<()> {
    if value.contains([sep, '"', '\r', '\n']) {
        write!(out, "\"{}\"", value.replace('"', "\"\""))
    } else {
        out.write_all(value.as_bytes())
    }
}

fn csv_record<'a>(fields: impl Iterator<Item = &'a str>, sep: char, out: &mut dyn Write) -> io::Result<()> {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            write!(out, "{sep}")?;
        }
        csv_field(field, sep, out)?;
    }
    out.write_all(CSV_EOL)
}

/// Title and footers are never printed.
pub(super) fn print_csv_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let sep = opt.csv_field_sep;
    if opt.start_table && !opt.tuples_only {
        csv_record(table.headers.iter().map(String::as_str), sep, out)?;
    }
    let ncol = table.ncolumns();
    for row in table.rows.iter().filter(|_| ncol > 0) {
        csv_record((0..ncol).map(|i| row.get(i).map_or("", String::as_str)), sep, out)?;
    }
    Ok(())
}

/// One `name,value` record per field.
pub(super) fn print_csv_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let sep = opt.csv_field_sep;
    for row in &table.rows {
        for (i, header) in table.headers.iter().enumerate() {
            csv_record([header.as_str(), row.get(i).map_or("", String::as_str)].into_iter(), sep, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::super::test::{render, sample};
    use super::super::*;

    #[test]
    fn unaligned() {
        let opt = PrintOptions { format: Format::Unaligned, ..Default::default() };
        assert_eq!(render(&sample(), &opt), "id|name\n1|alice\n22|bob\n(2 rows)\n");

        let opt = PrintOptions { format: Format::Unaligned, tuples_only: true, ..Default::default() };
        assert_eq!(render(&sample(), &opt), "1|alice\n22|bob\n");
    }

    #[test]
    fn unaligned_zero_separators() {
        let opt = PrintOptions {
            format: Format::Unaligned,
            tuples_only: true,
            field_sep: Separator { text: String::new(), zero: true },
            record_sep: Separator { text: String::new(), zero: true },
            ..Default::default()
        };
        assert_eq!(render(&sample(), &opt), "1\0alice\022\0bob\0");
    }

    #[test]
    fn unaligned_expanded() {
        let opt = PrintOptions { format: Format::Unaligned, expanded: Expanded::On, ..Default::default() };
        assert_eq!(render(&sample(), &opt), "id|1\nname|alice\n\nid|22\nname|bob\n");
    }

    #[test]
    fn csv_quoting() {
        let mut table = Table::new(Some("ignored".into()));
        table.add_header("a", Align::Left);
        table.add_header("b", Align::Left);
        table.add_row(vec!["x,y".into(), "say \"hi\"".into()]);
        table.add_row(vec!["line\nbreak".into(), "plain".into()]);
        let opt = PrintOptions { format: Format::Csv, ..Default::default() };
        assert_eq!(
            render(&table, &opt),
            "a,b\r\n\"x,y\",\"say \"\"hi\"\"\"\r\n\"line\nbreak\",plain\r\n"
        );
    }

    #[test]
    fn csv_separator_and_tuples_only() {
        let opt = PrintOptions { format: Format::Csv, csv_field_sep: ';', tuples_only: true, ..Default::default() };
        assert_eq!(render(&sample(), &opt), "1;alice\r\n22;bob\r\n");
    }
}
