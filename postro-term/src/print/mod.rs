//! Result table rendering.
//!
//! A [`Table`] is rendered into any [`Write`] according to [`PrintOptions`]. Rendering never
//! decides about the pager, callers render into a buffer first and hand it to [`pager`].
use std::io::{self, Write};

mod aligned;
mod markup;
mod plain;
pub mod pager;
pub mod pset;
pub mod width;

/// Output format, `\pset format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Aligned,
    Unaligned,
    Html,
    Csv,
    Asciidoc,
    Latex,
    LatexLongtable,
    TroffMs,
    Wrapped,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aligned => "aligned",
            Self::Unaligned => "unaligned",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Asciidoc => "asciidoc",
            Self::Latex => "latex",
            Self::LatexLongtable => "latex-longtable",
            Self::TroffMs => "troff-ms",
            Self::Wrapped => "wrapped",
        }
    }

    const ALL: &[Format] = &[
        Self::Aligned,
        Self::Asciidoc,
        Self::Csv,
        Self::Html,
        Self::Latex,
        Self::LatexLongtable,
        Self::TroffMs,
        Self::Unaligned,
        Self::Wrapped,
    ];

    /// Unique prefix match, `aligned` wins over `asciidoc` for `a`.
    pub fn parse(value: &str) -> Result<Format, String> {
        if value.is_empty() {
            return Err("\\pset: allowed formats are aligned, asciidoc, csv, html, latex, latex-longtable, troff-ms, unaligned, wrapped".into());
        }
        if let Some(exact) = Self::ALL.iter().find(|f| f.as_str().eq_ignore_ascii_case(value)) {
            return Ok(*exact);
        }
        let matches: Vec<_> = Self::ALL
            .iter()
            .filter(|f| f.as_str().starts_with(&value.to_ascii_lowercase()))
            .collect();
        match matches.as_slice() {
            [one] => Ok(**one),
            [Format::Aligned, ..] => Ok(Format::Aligned),
            [] => Err("\\pset: allowed formats are aligned, asciidoc, csv, html, latex, latex-longtable, troff-ms, unaligned, wrapped".into()),
            _ => Err(format!("\\pset: ambiguous abbreviation \"{value}\" matches both \"{}\" and \"{}\"", matches[0].as_str(), matches[1].as_str())),
        }
    }
}

/// Expanded (vertical) display, `\x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expanded {
    Off,
    On,
    /// Vertical only when the table is wider than the screen.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerUse {
    Never,
    OnDemand,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Ascii,
    OldAscii,
    Unicode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnicodeLine {
    Single,
    Double,
}

impl UnicodeLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

/// Width of the record header line in expanded mode, `\pset xheader_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWidth {
    Full,
    Column,
    Page,
    Exact(usize),
}

/// Field or record separator, a zero byte when `zero` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    pub text: String,
    pub zero: bool,
}

impl Separator {
    pub fn new(text: &str) -> Separator {
        Separator { text: text.to_owned(), zero: false }
    }

    fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.zero {
            out.write_all(b"\0")
        } else {
            out.write_all(self.text.as_bytes())
        }
    }
}

/// Column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

impl Align {
    fn letter(&self) -> char {
        match self {
            Align::Left => 'l',
            Align::Right => 'r',
        }
    }
}

/// Printing options, changed with `\pset` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub format: Format,
    pub expanded: Expanded,
    /// 0 to 3, formats clamp to what they support.
    pub border: u8,
    pub pager: PagerUse,
    pub pager_min_lines: usize,
    pub tuples_only: bool,
    /// Print the `(N rows)` footer.
    pub default_footer: bool,
    pub line_style: LineStyle,
    pub unicode_border: UnicodeLine,
    pub unicode_column: UnicodeLine,
    pub unicode_header: UnicodeLine,
    pub header_width: HeaderWidth,
    pub field_sep: Separator,
    pub record_sep: Separator,
    pub csv_field_sep: char,
    pub numeric_locale: bool,
    pub table_attr: Option<String>,
    pub null_print: String,
    pub title: Option<String>,
    /// `\pset columns`, 0 means the terminal width.
    pub columns: usize,
    /// `COLUMNS` from the environment at startup.
    pub env_columns: usize,
    /// Print the table header, false for the second and later chunk of a result.
    pub start_table: bool,
    /// Print footers, false for all but the last chunk.
    pub stop_table: bool,
    /// Records printed by earlier chunks, for record numbering.
    pub prior_records: u64,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            format: Format::Aligned,
            expanded: Expanded::Off,
            border: 1,
            pager: PagerUse::OnDemand,
            pager_min_lines: 0,
            tuples_only: false,
            default_footer: true,
            line_style: LineStyle::Ascii,
            unicode_border: UnicodeLine::Single,
            unicode_column: UnicodeLine::Single,
            unicode_header: UnicodeLine::Single,
            header_width: HeaderWidth::Full,
            field_sep: Separator::new("|"),
            record_sep: Separator::new("\n"),
            csv_field_sep: ',',
            numeric_locale: false,
            table_attr: None,
            null_print: String::new(),
            title: None,
            columns: 0,
            env_columns: 0,
            start_table: true,
            stop_table: true,
            prior_records: 0,
        }
    }
}

impl PrintOptions {
    /// Screen width to fit aligned output into, 0 when unknown.
    pub fn output_columns(&self, to_terminal: bool) -> usize {
        if self.columns > 0 {
            return self.columns;
        }
        if !to_terminal {
            return 0;
        }
        if self.env_columns > 0 {
            return self.env_columns;
        }
        terminal_size::terminal_size().map(|(w, _)| w.0 as usize).unwrap_or(0)
    }
}

/// A result ready to print.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub aligns: Vec<Align>,
    pub rows: Vec<Vec<String>>,
    /// Explicit footers, replacing the `(N rows)` default.
    pub footers: Option<Vec<String>>,
}

impl Table {
    pub fn new(title: Option<String>) -> Table {
        Table { title, ..Default::default() }
    }

    pub fn add_header(&mut self, header: impl Into<String>, align: Align) {
        self.headers.push(header.into());
        self.aligns.push(align);
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn add_footer(&mut self, footer: impl Into<String>) {
        self.footers.get_or_insert_with(Vec::new).push(footer.into());
    }

    pub fn ncolumns(&self) -> usize {
        self.headers.len()
    }

    /// Explicit footers, or `(N rows)` when the default footer applies.
    fn footers_with_default(&self, opt: &PrintOptions) -> Option<Vec<String>> {
        match &self.footers {
            None if opt.default_footer => {
                let total = opt.prior_records + self.rows.len() as u64;
                Some(vec![row_count(total)])
            }
            footers => footers.clone(),
        }
    }

    fn cells(&self) -> impl Iterator<Item = (usize, &str)> {
        self.rows.iter().flat_map(|row| row.iter().enumerate().map(|(i, c)| (i, c.as_str())))
    }
}

/// `(1 row)` or `(N rows)`.
pub fn row_count(n: u64) -> String {
    if n == 1 { "(1 row)".to_owned() } else { format!("({n} rows)") }
}

/// Render `table`, `to_terminal` tells whether the screen width applies.
pub fn print_table(table: &Table, opt: &PrintOptions, out: &mut dyn Write, to_terminal: bool) -> io::Result<()> {
    let vertical = opt.expanded == Expanded::On;
    match opt.format {
        Format::Aligned | Format::Wrapped => {
            let columns = opt.output_columns(to_terminal);
            if vertical {
                aligned::print_vertical(table, opt, out, columns)
            } else {
                aligned::print_text(table, opt, out, columns)
            }
        }
        Format::Unaligned if vertical => plain::print_unaligned_vertical(table, opt, out),
        Format::Unaligned => plain::print_unaligned_text(table, opt, out),
        Format::Csv if vertical => plain::print_csv_vertical(table, opt, out),
        Format::Csv => plain::print_csv_text(table, opt, out),
        Format::Html if vertical => markup::print_html_vertical(table, opt, out),
        Format::Html => markup::print_html_text(table, opt, out),
        Format::Asciidoc if vertical => markup::print_asciidoc_vertical(table, opt, out),
        Format::Asciidoc => markup::print_asciidoc_text(table, opt, out),
        Format::Latex | Format::LatexLongtable if vertical => markup::print_latex_vertical(table, opt, out),
        Format::Latex => markup::print_latex_text(table, opt, out),
        Format::LatexLongtable => markup::print_latex_longtable_text(table, opt, out),
        Format::TroffMs if vertical => markup::print_troff_ms_vertical(table, opt, out),
        Format::TroffMs => markup::print_troff_ms_text(table, opt, out),
    }
}

/// Insert thousands separators into a number, other text is returned unchanged.
pub fn format_numeric_locale(s: &str) -> String {
    const GROUP: usize = 3;
    const THOUSANDS: &str = ",";

    if s.is_empty() || !s.bytes().all(|b| b"0123456789+-.eE".contains(&b)) {
        return s.to_owned();
    }

    let (sign, rest) = match s.as_bytes()[0] {
        b'-' | b'+' => s.split_at(1),
        _ => ("", s),
    };
    let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let (int, tail) = rest.split_at(int_len);

    let mut out = String::with_capacity(s.len() + int_len / GROUP);
    out.push_str(sign);
    let mut leading = match int_len % GROUP {
        0 => GROUP,
        n => n,
    };
    for (i, c) in int.chars().enumerate() {
        if i > 0 {
            leading -= 1;
            if leading == 0 {
                out.push_str(THOUSANDS);
                leading = GROUP;
            }
        }
        out.push(c);
    }
    out.push_str(tail);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    pub(super) fn sample() -> Table {
        let mut table = Table::new(None);
        table.add_header("id", Align::Right);
        table.add_header("name", Align::Left);
        table.add_row(vec!["1".into(), "alice".into()]);
        table.add_row(vec!["22".into(), "bob".into()]);
        table
    }

    pub(super) fn render(table: &Table, opt: &PrintOptions) -> String {
        let mut out = vec![];
        print_table(table, opt, &mut out, false).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn format_abbreviations() {
        assert_eq!(Format::parse("a"), Ok(Format::Aligned));
        assert_eq!(Format::parse("u"), Ok(Format::Unaligned));
        assert_eq!(Format::parse("latex-l"), Ok(Format::LatexLongtable));
        assert_eq!(Format::parse("latex"), Ok(Format::Latex));
        assert!(Format::parse("l").is_err());
        assert!(Format::parse("bogus").is_err());
    }

    #[test]
    fn numeric_locale() {
        assert_eq!(format_numeric_locale("1234567"), "1,234,567");
        assert_eq!(format_numeric_locale("-1234.5678"), "-1,234.5678");
        assert_eq!(format_numeric_locale("123"), "123");
        assert_eq!(format_numeric_locale("$1,000.00"), "$1,000.00");
    }

    #[test]
    fn row_footer() {
        assert_eq!(row_count(1), "(1 row)");
        assert_eq!(row_count(0), "(0 rows)");
    }
}
