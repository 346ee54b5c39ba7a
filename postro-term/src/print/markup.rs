//! Document markup formats: `html`, `asciidoc`, `latex`, `latex-longtable` and `troff-ms`.
use std::io::{self, Write};

use super::{Align, PrintOptions, Table};

fn value(row: &[String], i: usize) -> &str {
    row.get(i).map_or("", String::as_str)
}

fn is_blank(s: &str) -> bool {
    s.trim_start_matches([' ', '\t']).is_empty()
}

fn align_word(table: &Table, i: usize) -> &'static str {
    match table.aligns.get(i) {
        Some(Align::Right) => "right",
        _ => "left",
    }
}

fn align_letter(table: &Table, i: usize) -> char {
    table.aligns.get(i).map_or('l', Align::letter)
}

/// Rows of a table that has columns.
fn rows(table: &Table) -> impl Iterator<Item = &Vec<String>> {
    let ncol = table.ncolumns();
    table.rows.iter().filter(move |_| ncol > 0)
}

// html

fn html_escape(s: &str, out: &mut dyn Write) -> io::Result<()> {
    let mut leading_space = true;
    for c in s.chars() {
        match c {
            '&' => out.write_all(b"&amp;")?,
            '<' => out.write_all(b"&lt;")?,
            '>' => out.write_all(b"&gt;")?,
            '\n' => out.write_all(b"<br />\n")?,
            '"' => out.write_all(b"&quot;")?,
            ' ' if leading_space => out.write_all(b"&nbsp;")?,
            _ => write!(out, "{c}")?,
        }
        if c != ' ' {
            leading_space = false;
        }
    }
    Ok(())
}

fn html_open(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    write!(out, "<table border=\"{}\"", opt.border)?;
    if let Some(attr) = &opt.table_attr {
        write!(out, " {attr}")?;
    }
    out.write_all(b">\n")?;
    if let Some(title) = table.title.as_ref().filter(|_| !opt.tuples_only) {
        out.write_all(b"  <caption>")?;
        html_escape(title, out)?;
        out.write_all(b"</caption>\n")?;
    }
    Ok(())
}

fn html_cell(text: &str, out: &mut dyn Write) -> io::Result<()> {
    if is_blank(text) {
        out.write_all(b"&nbsp; ")
    } else {
        html_escape(text, out)
    }
}

fn html_close(footers: Option<Vec<String>>, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(b"</table>\n")?;
    if let Some(footers) = footers.filter(|_| !opt.tuples_only) {
        out.write_all(b"<p>")?;
        for footer in footers {
            html_escape(&footer, out)?;
            out.write_all(b"<br />\n")?;
        }
        out.write_all(b"</p>")?;
    }
    out.write_all(b"\n")
}

pub(super) fn print_html_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    if opt.start_table {
        html_open(table, opt, out)?;
        if !opt.tuples_only {
            out.write_all(b"  <tr>\n")?;
            for header in &table.headers {
                out.write_all(b"    <th align=\"center\">")?;
                html_escape(header, out)?;
                out.write_all(b"</th>\n")?;
            }
            out.write_all(b"  </tr>\n")?;
        }
    }

    for row in rows(table) {
        out.write_all(b"  <tr valign=\"top\">\n")?;
        for i in 0..table.ncolumns() {
            write!(out, "    <td align=\"{}\">", align_word(table, i))?;
            html_cell(value(row, i), out)?;
            out.write_all(b"</td>\n")?;
        }
        out.write_all(b"  </tr>\n")?;
    }

    if opt.stop_table {
        html_close(table.footers_with_default(opt), opt, out)?;
    }
    Ok(())
}

pub(super) fn print_html_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let mut record = opt.prior_records + 1;
    if opt.start_table {
        html_open(table, opt, out)?;
    }

    for row in rows(table) {
        if opt.tuples_only {
            out.write_all(b"\n  <tr><td colspan=\"2\">&nbsp;</td></tr>\n")?;
        } else {
            write!(out, "\n  <tr><td colspan=\"2\" align=\"center\">Record {record}</td></tr>\n")?;
            record += 1;
        }
        for (i, header) in table.headers.iter().enumerate() {
            out.write_all(b"  <tr valign=\"top\">\n    <th>")?;
            html_escape(header, out)?;
            out.write_all(b"</th>\n")?;
            write!(out, "    <td align=\"{}\">", align_word(table, i))?;
            html_cell(value(row, i), out)?;
            out.write_all(b"</td>\n  </tr>\n")?;
        }
    }

    if opt.stop_table {
        html_close(table.footers.clone(), opt, out)?;
    }
    Ok(())
}

// asciidoc

fn asciidoc_escape(s: &str, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(s.replace('|', "\\|").as_bytes())
}

fn asciidoc_frame(border: u8) -> &'static str {
    match border {
        0 => ",frame=\"none\",grid=\"none\"",
        1 => ",frame=\"none\"",
        2 => ",frame=\"all\",grid=\"all\"",
        _ => "",
    }
}

fn asciidoc_open(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    // a table starts a new paragraph
    out.write_all(b"\n")?;
    if let Some(title) = table.title.as_ref().filter(|_| !opt.tuples_only) {
        writeln!(out, ".{title}")?;
    }
    Ok(())
}

fn asciidoc_footers(footers: Option<Vec<String>>, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    if let Some(footers) = footers.filter(|_| !opt.tuples_only) {
        out.write_all(b"\n....\n")?;
        for footer in footers {
            writeln!(out, "{footer}")?;
        }
        out.write_all(b"....\n")?;
    }
    Ok(())
}

pub(super) fn print_asciidoc_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let ncol = table.ncolumns();
    if opt.start_table {
        asciidoc_open(table, opt, out)?;
        let header = if opt.tuples_only { "" } else { "options=\"header\"," };
        let cols: Vec<_> = (0..ncol)
            .map(|i| if align_letter(table, i) == 'r' { ">l" } else { "<l" })
            .collect();
        writeln!(out, "[{header}cols=\"{}\"{}]", cols.join(","), asciidoc_frame(opt.border))?;
        out.write_all(b"|====\n")?;

        if !opt.tuples_only {
            for (i, header) in table.headers.iter().enumerate() {
                if i > 0 {
                    out.write_all(b" ")?;
                }
                out.write_all(b"^l|")?;
                asciidoc_escape(header, out)?;
            }
            out.write_all(b"\n")?;
        }
    }

    for row in rows(table) {
        for i in 0..ncol {
            if i > 0 {
                out.write_all(b" ")?;
            }
            out.write_all(b"|")?;
            let text = value(row, i);
            if !is_blank(text) {
                asciidoc_escape(text, out)?;
            } else if i + 1 < ncol {
                out.write_all(b" ")?;
            }
        }
        out.write_all(b"\n")?;
    }
    out.write_all(b"|====\n")?;

    if opt.stop_table {
        asciidoc_footers(table.footers_with_default(opt), opt, out)?;
    }
    Ok(())
}

pub(super) fn print_asciidoc_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let mut record = opt.prior_records + 1;
    if opt.start_table {
        asciidoc_open(table, opt, out)?;
        writeln!(out, "[cols=\"h,l\"{}]", asciidoc_frame(opt.border))?;
        out.write_all(b"|====\n")?;
    }

    for row in rows(table) {
        if opt.tuples_only {
            out.write_all(b"2+|\n")?;
        } else {
            writeln!(out, "2+^|Record {record}")?;
            record += 1;
        }
        for (i, header) in table.headers.iter().enumerate() {
            out.write_all(b"<l|")?;
            asciidoc_escape(header, out)?;
            let align = if align_letter(table, i) == 'r' { ">l" } else { "<l" };
            write!(out, " {align}|")?;
            let text = value(row, i);
            if is_blank(text) {
                out.write_all(b" ")?;
            } else {
                asciidoc_escape(text, out)?;
            }
            out.write_all(b"\n")?;
        }
    }
    out.write_all(b"|====\n")?;

    if opt.stop_table {
        asciidoc_footers(table.footers.clone(), opt, out)?;
    }
    Ok(())
}

// latex

fn latex_escape(s: &str, out: &mut dyn Write) -> io::Result<()> {
    for c in s.chars() {
        match c {
            '#' => out.write_all(b"\\#")?,
            '$' => out.write_all(b"\\$")?,
            '%' => out.write_all(b"\\%")?,
            '&' => out.write_all(b"\\&")?,
            '<' => out.write_all(b"\\textless{}")?,
            '>' => out.write_all(b"\\textgreater{}")?,
            '\\' => out.write_all(b"\\textbackslash{}")?,
            '^' => out.write_all(b"\\^{}")?,
            '_' => out.write_all(b"\\_")?,
            '{' => out.write_all(b"\\{")?,
            '|' => out.write_all(b"\\textbar{}")?,
            '}' => out.write_all(b"\\}")?,
            '~' => out.write_all(b"\\~{}")?,
            '\n' => out.write_all(b"\\\\")?,
            _ => write!(out, "{c}")?,
        }
    }
    Ok(())
}

fn latex_title(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    if let Some(title) = table.title.as_ref().filter(|_| !opt.tuples_only) {
        out.write_all(b"\\begin{center}\n")?;
        latex_escape(title, out)?;
        out.write_all(b"\n\\end{center}\n\n")?;
    }
    Ok(())
}

fn latex_footers(footers: Option<Vec<String>>, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(b"\\end{tabular}\n\n\\noindent ")?;
    if let Some(footers) = footers.filter(|_| !opt.tuples_only) {
        for footer in footers {
            latex_escape(&footer, out)?;
            out.write_all(b" \\\\\n")?;
        }
    }
    out.write_all(b"\n")
}

pub(super) fn print_latex_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let border = opt.border.min(3);
    let ncol = table.ncolumns();

    if opt.start_table {
        latex_title(table, opt, out)?;
        out.write_all(b"\\begin{tabular}{")?;
        if border >= 2 {
            out.write_all(b"| ")?;
        }
        for i in 0..ncol {
            write!(out, "{}", align_letter(table, i))?;
            if border != 0 && i + 1 < ncol {
                out.write_all(b" | ")?;
            }
        }
        if border >= 2 {
            out.write_all(b" |")?;
        }
        out.write_all(b"}\n")?;

        if !opt.tuples_only {
            if border >= 2 {
                out.write_all(b"\\hline\n")?;
            }
            for (i, header) in table.headers.iter().enumerate() {
                if i > 0 {
                    out.write_all(b" & ")?;
                }
                out.write_all(b"\\textit{")?;
                latex_escape(header, out)?;
                out.write_all(b"}")?;
            }
            out.write_all(b" \\\\\n\\hline\n")?;
        }
    }

    for row in rows(table) {
        for i in 0..ncol {
            if i > 0 {
                out.write_all(b" & ")?;
            }
            latex_escape(value(row, i), out)?;
        }
        out.write_all(b" \\\\\n")?;
        if border == 3 {
            out.write_all(b"\\hline\n")?;
        }
    }

    if opt.stop_table {
        if border == 2 {
            out.write_all(b"\\hline\n")?;
        }
        latex_footers(table.footers_with_default(opt), opt, out)?;
    }
    Ok(())
}

fn longtable_headers(table: &Table, out: &mut dyn Write) -> io::Result<()> {
    for (i, header) in table.headers.iter().enumerate() {
        if i > 0 {
            out.write_all(b" & ")?;
        }
        out.write_all(b"\\small\\textbf{\\textit{")?;
        latex_escape(header, out)?;
        out.write_all(b"}}")?;
    }
    out.write_all(b" \\\\\n")
}

/// Left aligned columns take their widths, as fractions of the text width, from `tableattr`.
pub(super) fn print_latex_longtable_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let border = opt.border.min(3);
    let ncol = table.ncolumns();

    if opt.start_table {
        out.write_all(b"\\begin{longtable}{")?;
        if border >= 2 {
            out.write_all(b"| ")?;
        }
        let mut widths = opt.table_attr.as_deref().map(str::split_whitespace);
        let mut last_width = None;
        for i in 0..ncol {
            let letter = align_letter(table, i);
            match widths.as_mut().filter(|_| letter == 'l') {
                Some(widths) => match widths.next().or(last_width) {
                    Some(width) => {
                        write!(out, "p{{{width}\\textwidth}}")?;
                        last_width = Some(width);
                    }
                    None => out.write_all(b"l")?,
                },
                None => write!(out, "{letter}")?,
            }
            if border != 0 && i + 1 < ncol {
                out.write_all(b" | ")?;
            }
        }
        if border >= 2 {
            out.write_all(b" |")?;
        }
        out.write_all(b"}\n")?;

        if !opt.tuples_only {
            if border >= 2 {
                out.write_all(b"\\toprule\n")?;
            }
            longtable_headers(table, out)?;
            out.write_all(b"\\midrule\n\\endfirsthead\n")?;

            if border >= 2 {
                out.write_all(b"\\toprule\n")?;
            }
            longtable_headers(table, out)?;
            if border != 3 {
                out.write_all(b"\\midrule\n")?;
            }
            out.write_all(b"\\endhead\n")?;

            if let Some(title) = &table.title {
                if border == 2 {
                    out.write_all(b"\\bottomrule\n")?;
                }
                out.write_all(b"\\caption[")?;
                latex_escape(title, out)?;
                out.write_all(b" (Continued)]{")?;
                latex_escape(title, out)?;
                out.write_all(b"}\n\\endfoot\n")?;
                if border == 2 {
                    out.write_all(b"\\bottomrule\n")?;
                }
                out.write_all(b"\\caption[")?;
                latex_escape(title, out)?;
                out.write_all(b"]{")?;
                latex_escape(title, out)?;
                out.write_all(b"}\n\\endlastfoot\n")?;
            } else if border >= 2 {
                out.write_all(b"\\bottomrule\n\\endfoot\n")?;
                out.write_all(b"\\bottomrule\n\\endlastfoot\n")?;
            }
        }
    }

    for row in rows(table) {
        for i in 0..ncol {
            if i > 0 {
                out.write_all(b"\n&\n")?;
            }
            out.write_all(b"\\raggedright{")?;
            latex_escape(value(row, i), out)?;
            out.write_all(b"}")?;
        }
        out.write_all(b" \\tabularnewline\n")?;
        if border == 3 {
            out.write_all(b" \\hline\n")?;
        }
    }

    if opt.stop_table {
        out.write_all(b"\\end{longtable}\n")?;
    }
    Ok(())
}

pub(super) fn print_latex_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let border = opt.border.min(2);
    let mut record = opt.prior_records + 1;

    if opt.start_table {
        latex_title(table, opt, out)?;
        let cols = ["cl", "c|l", "|c|l|"][border as usize];
        writeln!(out, "\\begin{{tabular}}{{{cols}}}")?;
    }

    for row in rows(table) {
        if !opt.tuples_only {
            if border == 2 {
                out.write_all(b"\\hline\n")?;
                writeln!(out, "\\multicolumn{{2}}{{|c|}}{{\\textit{{Record {record}}}}} \\\\")?;
            } else {
                writeln!(out, "\\multicolumn{{2}}{{c}}{{\\textit{{Record {record}}}}} \\\\")?;
            }
            record += 1;
        }
        if border >= 1 {
            out.write_all(b"\\hline\n")?;
        }
        for (i, header) in table.headers.iter().enumerate() {
            latex_escape(header, out)?;
            out.write_all(b" & ")?;
            latex_escape(value(row, i), out)?;
            out.write_all(b" \\\\\n")?;
        }
    }

    if opt.stop_table {
        if border == 2 {
            out.write_all(b"\\hline\n")?;
        }
        latex_footers(table.footers.clone(), opt, out)?;
    }
    Ok(())
}

// troff -ms

fn troff_escape(s: &str, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(s.replace('\\', "\\(rs").as_bytes())
}

fn troff_open(table: &Table, opt: &PrintOptions, border: u8, out: &mut dyn Write) -> io::Result<()> {
    if let Some(title) = table.title.as_ref().filter(|_| !opt.tuples_only) {
        out.write_all(b".LP\n.DS C\n")?;
        troff_escape(title, out)?;
        out.write_all(b"\n.DE\n")?;
    }
    out.write_all(b".LP\n.TS\n")?;
    out.write_all(if border == 2 { b"center box;\n" as &[u8] } else { b"center;\n" })
}

fn troff_close(footers: Option<Vec<String>>, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(b".TE\n.DS L\n")?;
    if let Some(footers) = footers.filter(|_| !opt.tuples_only) {
        for footer in footers {
            troff_escape(&footer, out)?;
            out.write_all(b"\n")?;
        }
    }
    out.write_all(b".DE\n")
}

pub(super) fn print_troff_ms_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    let border = opt.border.min(2);
    let ncol = table.ncolumns();

    if opt.start_table {
        troff_open(table, opt, border, out)?;
        for i in 0..ncol {
            write!(out, "{}", align_letter(table, i))?;
            if border > 0 && i + 1 < ncol {
                out.write_all(b" | ")?;
            }
        }
        out.write_all(b".\n")?;

        if !opt.tuples_only {
            for (i, header) in table.headers.iter().enumerate() {
                if i > 0 {
                    out.write_all(b"\t")?;
                }
                out.write_all(b"\\fI")?;
                troff_escape(header, out)?;
                out.write_all(b"\\fP")?;
            }
            out.write_all(b"\n_\n")?;
        }
    }

    for row in rows(table) {
        for i in 0..ncol {
            if i > 0 {
                out.write_all(b"\t")?;
            }
            troff_escape(value(row, i), out)?;
        }
        out.write_all(b"\n")?;
    }

    if opt.stop_table {
        troff_close(table.footers_with_default(opt), opt, out)?;
    }
    Ok(())
}

pub(super) fn print_troff_ms_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write) -> io::Result<()> {
    #[derive(PartialEq)]
    enum Current {
        None,
        Header,
        Body,
    }

    let border = opt.border.min(2);
    let mut record = opt.prior_records + 1;
    let mut current = Current::None;

    if opt.start_table {
        troff_open(table, opt, border, out)?;
        if opt.tuples_only {
            out.write_all(b"c l;\n")?;
        }
    } else {
        current = Current::Body;
    }

    for row in rows(table) {
        if !opt.tuples_only {
            if current != Current::Header {
                if border == 2 && record > 1 {
                    out.write_all(b"_\n")?;
                }
                if current != Current::None {
                    out.write_all(b".T&\n")?;
                }
                out.write_all(b"c s.\n")?;
                current = Current::Header;
            }
            writeln!(out, "\\fIRecord {record}\\fP")?;
            record += 1;
        }
        if border >= 1 {
            out.write_all(b"_\n")?;
        }
        for (i, header) in table.headers.iter().enumerate() {
            if !opt.tuples_only && current != Current::Body {
                if current != Current::None {
                    out.write_all(b".T&\n")?;
                }
                out.write_all(if border != 1 { b"c l.\n" as &[u8] } else { b"c | l.\n" })?;
                current = Current::Body;
            }
            troff_escape(header, out)?;
            out.write_all(b"\t")?;
            troff_escape(value(row, i), out)?;
            out.write_all(b"\n")?;
        }
    }

    if opt.stop_table {
        troff_close(table.footers.clone(), opt, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::super::test::{render, sample};
    use super::super::*;

    #[test]
    fn html() {
        let mut table = sample();
        table.rows[1][1] = "<b> & \"c\"".into();
        table.rows[0][1] = "  ".into();
        let opt = PrintOptions { format: Format::Html, ..Default::default() };
        assert_eq!(
            render(&table, &opt),
            "<table border=\"1\">\n\
             \x20 <tr>\n\
             \x20   <th align=\"center\">id</th>\n\
             \x20   <th align=\"center\">name</th>\n\
             \x20 </tr>\n\
             \x20 <tr valign=\"top\">\n\
             \x20   <td align=\"right\">1</td>\n\
             \x20   <td align=\"left\">&nbsp; </td>\n\
             \x20 </tr>\n\
             \x20 <tr valign=\"top\">\n\
             \x20   <td align=\"right\">22</td>\n\
             \x20   <td align=\"left\">&lt;b&gt; &amp; &quot;c&quot;</td>\n\
             \x20 </tr>\n\
             </table>\n\
             <p>(2 rows)<br />\n</p>\n"
        );
    }

    #[test]
    fn html_leading_space() {
        let mut out = vec![];
        super::html_escape("  a b\nc", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "&nbsp;&nbsp;a b<br />\nc");
    }

    #[test]
    fn asciidoc() {
        let opt = PrintOptions { format: Format::Asciidoc, ..Default::default() };
        assert_eq!(
            render(&sample(), &opt),
            "\n[options=\"header\",cols=\">l,<l\",frame=\"none\"]\n|====\n^l|id ^l|name\n|1 |alice\n|22 |bob\n|====\n\n....\n(2 rows)\n....\n"
        );
    }

    #[test]
    fn latex() {
        let mut table = sample();
        table.rows[1][1] = "a_b".into();
        let opt = PrintOptions { format: Format::Latex, ..Default::default() };
        assert_eq!(
            render(&table, &opt),
            "\\begin{tabular}{r | l}\n\\textit{id} & \\textit{name} \\\\\n\\hline\n1 & alice \\\\\n22 & a\\_b \\\\\n\\end{tabular}\n\n\\noindent (2 rows) \\\\\n\n"
        );
    }

    #[test]
    fn longtable_widths() {
        let mut table = Table::new(None);
        table.add_header("a", Align::Left);
        table.add_header("b", Align::Right);
        table.add_header("c", Align::Left);
        let opt = PrintOptions {
            format: Format::LatexLongtable,
            tuples_only: true,
            table_attr: Some("0.3".into()),
            ..Default::default()
        };
        assert_eq!(
            render(&table, &opt),
            "\\begin{longtable}{p{0.3\\textwidth} | r | p{0.3\\textwidth}}\n\\end{longtable}\n"
        );
    }

    #[test]
    fn troff() {
        let opt = PrintOptions { format: Format::TroffMs, ..Default::default() };
        assert_eq!(
            render(&sample(), &opt),
            ".LP\n.TS\ncenter;\nr | l.\n\\fIid\\fP\t\\fIname\\fP\n_\n1\talice\n22\tbob\n.TE\n.DS L\n(2 rows)\n.DE\n"
        );
    }
}
