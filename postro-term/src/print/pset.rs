//! `\pset` option names, values and status messages.
use super::{Expanded, Format, HeaderWidth, LineStyle, PagerUse, PrintOptions, Separator, UnicodeLine};
use crate::{
    variables::parse_bool_var,
    Error, Result,
};

/// Options listed by a bare `\pset`.
pub const OPTIONS: &[&str] = &[
    "border",
    "columns",
    "csv_fieldsep",
    "expanded",
    "fieldsep",
    "fieldsep_zero",
    "footer",
    "format",
    "linestyle",
    "null",
    "numericlocale",
    "pager",
    "pager_min_lines",
    "recordsep",
    "recordsep_zero",
    "tableattr",
    "title",
    "tuples_only",
    "unicode_border_linestyle",
    "unicode_column_linestyle",
    "unicode_header_linestyle",
    "xheader_width",
];

fn toggle(current: bool, value: Option<&str>, name: &str) -> Result<bool> {
    match value {
        Some(value) => parse_bool_var(value, name),
        None => Ok(!current),
    }
}

fn number(value: Option<&str>, current: usize) -> usize {
    value.map_or(current, |v| v.trim().parse::<i64>().unwrap_or(0).max(0) as usize)
}

fn unicode_line(value: &str, which: &str) -> Result<UnicodeLine> {
    let lower = value.to_ascii_lowercase();
    if !lower.is_empty() && "single".starts_with(&lower) {
        Ok(UnicodeLine::Single)
    } else if !lower.is_empty() && "double".starts_with(&lower) {
        Ok(UnicodeLine::Double)
    } else {
        Err(Error::usage(format!("\\pset: allowed Unicode {which} line styles are single, double")))
    }
}

/// Set option `name`, a missing `value` toggles booleans and unsets strings.
pub fn apply(opt: &mut PrintOptions, name: &str, value: Option<&str>) -> Result<()> {
    match name {
        "format" => {
            if let Some(value) = value {
                opt.format = Format::parse(value).map_err(Error::usage)?;
            }
        }
        "linestyle" => {
            if let Some(value) = value {
                let lower = value.to_ascii_lowercase();
                opt.line_style = match lower.as_str() {
                    "" => return Err(Error::usage("\\pset: allowed line styles are ascii, old-ascii, unicode")),
                    v if "ascii".starts_with(v) => LineStyle::Ascii,
                    v if "old-ascii".starts_with(v) => LineStyle::OldAscii,
                    v if "unicode".starts_with(v) => LineStyle::Unicode,
                    _ => return Err(Error::usage("\\pset: allowed line styles are ascii, old-ascii, unicode")),
                };
            }
        }
        "unicode_border_linestyle" => {
            if let Some(value) = value {
                opt.unicode_border = unicode_line(value, "border")?;
            }
        }
        "unicode_column_linestyle" => {
            if let Some(value) = value {
                opt.unicode_column = unicode_line(value, "column")?;
            }
        }
        "unicode_header_linestyle" => {
            if let Some(value) = value {
                opt.unicode_header = unicode_line(value, "header")?;
            }
        }
        "border" => {
            if let Some(value) = value {
                opt.border = value.trim().parse::<i64>().unwrap_or(0).clamp(0, u8::MAX as i64) as u8;
            }
        }
        "expanded" | "x" => {
            opt.expanded = match value {
                Some(v) if v.eq_ignore_ascii_case("auto") => Expanded::Auto,
                Some(v) => match parse_bool_var(v, name)? {
                    true => Expanded::On,
                    false => Expanded::Off,
                },
                None if opt.expanded != Expanded::Off => Expanded::Off,
                None => Expanded::On,
            };
        }
        "xheader_width" => {
            opt.header_width = match value.map(str::trim) {
                None | Some("full") => HeaderWidth::Full,
                Some("column") => HeaderWidth::Column,
                Some("page") => HeaderWidth::Page,
                Some(v) => match v.parse::<usize>() {
                    Ok(n) if n > 0 => HeaderWidth::Exact(n),
                    _ => {
                        return Err(Error::usage(
                            "\\pset: allowed xheader_width values are \"full\" (default), \"column\", \"page\", or a number specifying the exact width",
                        ));
                    }
                },
            };
        }
        "csv_fieldsep" => {
            if let Some(value) = value {
                let mut chars = value.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else {
                    return Err(Error::usage("\\pset: csv_fieldsep must be a single one-byte character"));
                };
                if !c.is_ascii() {
                    return Err(Error::usage("\\pset: csv_fieldsep must be a single one-byte character"));
                }
                if matches!(c, '"' | '\n' | '\r') {
                    return Err(Error::usage(
                        "\\pset: csv_fieldsep cannot be a double quote, a newline, or a carriage return",
                    ));
                }
                opt.csv_field_sep = c;
            }
        }
        "numericlocale" => opt.numeric_locale = toggle(opt.numeric_locale, value, name)?,
        "fieldsep" => {
            if let Some(value) = value {
                opt.field_sep = Separator::new(value);
            }
        }
        "fieldsep_zero" => opt.field_sep = Separator { text: String::new(), zero: true },
        "recordsep" => {
            if let Some(value) = value {
                opt.record_sep = Separator::new(value);
            }
        }
        "recordsep_zero" => opt.record_sep = Separator { text: String::new(), zero: true },
        "tuples_only" | "t" => opt.tuples_only = toggle(opt.tuples_only, value, name)?,
        "title" | "C" => opt.title = value.map(str::to_owned),
        "tableattr" | "T" => opt.table_attr = value.map(str::to_owned),
        "pager" => {
            opt.pager = match value {
                Some(v) if v.eq_ignore_ascii_case("always") => PagerUse::Always,
                Some(v) => match parse_bool_var(v, name)? {
                    true => PagerUse::OnDemand,
                    false => PagerUse::Never,
                },
                None if opt.pager == PagerUse::OnDemand => PagerUse::Never,
                None => PagerUse::OnDemand,
            };
        }
        "pager_min_lines" => opt.pager_min_lines = number(value, opt.pager_min_lines),
        "footer" => opt.default_footer = toggle(opt.default_footer, value, name)?,
        "columns" => opt.columns = number(value, opt.columns),
        "null" => {
            if let Some(value) = value {
                opt.null_print = value.to_owned();
            }
        }
        _ => return Err(Error::usage(format!("\\pset: unknown option: {name}"))),
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Status message for option `name`, shown after it is changed.
pub fn describe(opt: &PrintOptions, name: &str) -> Result<String> {
    let message = match name {
        "border" => format!("Border style is {}.", opt.border),
        "columns" if opt.columns == 0 => "Target width is unset.".into(),
        "columns" => format!("Target width is {}.", opt.columns),
        "csv_fieldsep" => format!("Field separator for CSV is \"{}\".", opt.csv_field_sep),
        "expanded" | "x" => match opt.expanded {
            Expanded::Auto => "Expanded display is used automatically.".into(),
            Expanded::On => "Expanded display is on.".into(),
            Expanded::Off => "Expanded display is off.".into(),
        },
        "xheader_width" => match opt.header_width {
            HeaderWidth::Full => "Expanded header width is \"full\".".into(),
            HeaderWidth::Column => "Expanded header width is \"column\".".into(),
            HeaderWidth::Page => "Expanded header width is \"page\".".into(),
            HeaderWidth::Exact(n) => format!("Expanded header width is {n}."),
        },
        "fieldsep" | "fieldsep_zero" if opt.field_sep.zero => "Field separator is zero byte.".into(),
        "fieldsep" | "fieldsep_zero" => format!("Field separator is \"{}\".", opt.field_sep.text),
        "footer" => format!("Default footer is {}.", on_off(opt.default_footer)),
        "format" => format!("Output format is {}.", opt.format.as_str()),
        "linestyle" => format!("Line style is {}.", line_style_name(opt.line_style)),
        "null" => format!("Null display is \"{}\".", opt.null_print),
        "numericlocale" => format!("Locale-adjusted numeric output is {}.", on_off(opt.numeric_locale)),
        "pager" => match opt.pager {
            PagerUse::OnDemand => "Pager is used for long output.".into(),
            PagerUse::Always => "Pager is always used.".into(),
            PagerUse::Never => "Pager usage is off.".into(),
        },
        "pager_min_lines" if opt.pager_min_lines == 1 => "Pager won't be used for less than 1 line.".into(),
        "pager_min_lines" => format!("Pager won't be used for less than {} lines.", opt.pager_min_lines),
        "recordsep" | "recordsep_zero" if opt.record_sep.zero => "Record separator is zero byte.".into(),
        "recordsep" | "recordsep_zero" if opt.record_sep.text == "\n" => "Record separator is <newline>.".into(),
        "recordsep" | "recordsep_zero" => format!("Record separator is \"{}\".", opt.record_sep.text),
        "tableattr" | "T" => match &opt.table_attr {
            Some(attr) => format!("Table attributes are \"{attr}\"."),
            None => "Table attributes unset.".into(),
        },
        "title" | "C" => match &opt.title {
            Some(title) => format!("Title is \"{title}\"."),
            None => "Title is unset.".into(),
        },
        "tuples_only" | "t" => format!("Tuples only is {}.", on_off(opt.tuples_only)),
        "unicode_border_linestyle" => {
            format!("Unicode border line style is \"{}\".", opt.unicode_border.as_str())
        }
        "unicode_column_linestyle" => {
            format!("Unicode column line style is \"{}\".", opt.unicode_column.as_str())
        }
        "unicode_header_linestyle" => {
            format!("Unicode header line style is \"{}\".", opt.unicode_header.as_str())
        }
        _ => return Err(Error::usage(format!("\\pset: unknown option: {name}"))),
    };
    Ok(message)
}

fn line_style_name(style: LineStyle) -> &'static str {
    match style {
        LineStyle::Ascii => "ascii",
        LineStyle::OldAscii => "old-ascii",
        LineStyle::Unicode => "unicode",
    }
}

/// Quote for the `\pset` listing, newlines and quotes escaped.
fn quoted(value: &str) -> String {
    let mut out = String::from("'");
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Current value of option `name` as listed by a bare `\pset`.
pub fn value_string(opt: &PrintOptions, name: &str) -> String {
    match name {
        "border" => opt.border.to_string(),
        "columns" => opt.columns.to_string(),
        "csv_fieldsep" => quoted(&opt.csv_field_sep.to_string()),
        "expanded" => match opt.expanded {
            Expanded::Auto => "auto".into(),
            Expanded::On => "on".into(),
            Expanded::Off => "off".into(),
        },
        "fieldsep" => quoted(&opt.field_sep.text),
        "fieldsep_zero" => on_off(opt.field_sep.zero).into(),
        "footer" => on_off(opt.default_footer).into(),
        "format" => opt.format.as_str().into(),
        "linestyle" => line_style_name(opt.line_style).into(),
        "null" => quoted(&opt.null_print),
        "numericlocale" => on_off(opt.numeric_locale).into(),
        "pager" => match opt.pager {
            PagerUse::OnDemand => "on".into(),
            PagerUse::Always => "always".into(),
            PagerUse::Never => "off".into(),
        },
        "pager_min_lines" => opt.pager_min_lines.to_string(),
        "recordsep" => quoted(&opt.record_sep.text),
        "recordsep_zero" => on_off(opt.record_sep.zero).into(),
        "tableattr" => opt.table_attr.as_deref().map(quoted).unwrap_or_default(),
        "title" => opt.title.as_deref().map(quoted).unwrap_or_default(),
        "tuples_only" => on_off(opt.tuples_only).into(),
        "unicode_border_linestyle" => opt.unicode_border.as_str().into(),
        "unicode_column_linestyle" => opt.unicode_column.as_str().into(),
        "unicode_header_linestyle" => opt.unicode_header.as_str().into(),
        "xheader_width" => match opt.header_width {
            HeaderWidth::Full => "full".into(),
            HeaderWidth::Column => "column".into(),
            HeaderWidth::Page => "page".into(),
            HeaderWidth::Exact(n) => n.to_string(),
        },
        _ => String::new(),
    }
}

/// The full `\pset` listing.
pub fn listing(opt: &PrintOptions) -> String {
    OPTIONS
        .iter()
        .map(|name| format!("{name:<24} {}\n", value_string(opt, name)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn toggles_and_values() {
        let mut opt = PrintOptions::default();
        apply(&mut opt, "tuples_only", None).unwrap();
        assert!(opt.tuples_only);
        apply(&mut opt, "tuples_only", Some("off")).unwrap();
        assert!(!opt.tuples_only);

        apply(&mut opt, "expanded", Some("auto")).unwrap();
        assert_eq!(opt.expanded, Expanded::Auto);
        apply(&mut opt, "expanded", None).unwrap();
        assert_eq!(opt.expanded, Expanded::Off);
        apply(&mut opt, "x", None).unwrap();
        assert_eq!(opt.expanded, Expanded::On);

        apply(&mut opt, "format", Some("u")).unwrap();
        assert_eq!(describe(&opt, "format").unwrap(), "Output format is unaligned.");

        apply(&mut opt, "null", Some("(null)")).unwrap();
        assert_eq!(describe(&opt, "null").unwrap(), "Null display is \"(null)\".");

        apply(&mut opt, "title", Some("T")).unwrap();
        apply(&mut opt, "title", None).unwrap();
        assert_eq!(describe(&opt, "title").unwrap(), "Title is unset.");
    }

    #[test]
    fn invalid_values() {
        let mut opt = PrintOptions::default();
        let err = apply(&mut opt, "linestyle", Some("fancy")).unwrap_err();
        assert_eq!(err.to_string(), "\\pset: allowed line styles are ascii, old-ascii, unicode");
        assert!(apply(&mut opt, "csv_fieldsep", Some(";;")).is_err());
        assert!(apply(&mut opt, "csv_fieldsep", Some("\"")).is_err());
        assert!(apply(&mut opt, "bogus", None).is_err());
        assert_eq!(opt, PrintOptions::default());
    }

    #[test]
    fn separators() {
        let mut opt = PrintOptions::default();
        assert_eq!(describe(&opt, "recordsep").unwrap(), "Record separator is <newline>.");
        apply(&mut opt, "fieldsep_zero", None).unwrap();
        assert_eq!(describe(&opt, "fieldsep").unwrap(), "Field separator is zero byte.");
        apply(&mut opt, "fieldsep", Some(",")).unwrap();
        assert_eq!(value_string(&opt, "fieldsep"), "','");
        assert_eq!(value_string(&opt, "recordsep"), "'\\n'");
    }

    #[test]
    fn full_listing() {
        let listing = listing(&PrintOptions::default());
        assert!(listing.starts_with("border                   1\n"));
        assert!(listing.contains("format                   aligned\n"));
        assert_eq!(listing.lines().count(), OPTIONS.len());
    }
}
