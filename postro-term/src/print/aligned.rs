//! `aligned` and `wrapped` formats, in normal and expanded layout.
use std::io::{self, Write};

use super::{
    width::{format_lines, prefix_to_width, Line},
    Align, Format, HeaderWidth, LineStyle, PrintOptions, Table, UnicodeLine,
};

#[derive(Debug, Clone, Copy)]
struct Rule {
    hrule: &'static str,
    left: &'static str,
    mid: &'static str,
    right: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RulePos {
    Top = 0,
    Middle = 1,
    Bottom = 2,
    Data = 3,
}

/// Characters used to draw one line style.
#[derive(Debug, Clone)]
struct TextFormat {
    rules: [Rule; 4],
    midvrule_nl: &'static str,
    midvrule_wrap: &'static str,
    midvrule_blank: &'static str,
    header_nl_left: &'static str,
    header_nl_right: &'static str,
    nl_left: &'static str,
    nl_right: &'static str,
    wrap_left: &'static str,
    wrap_right: &'static str,
    wrap_right_border: bool,
    old_ascii: bool,
}

const ASCII_RULE: Rule = Rule { hrule: "-", left: "+", mid: "+", right: "+" };
const ASCII_DATA: Rule = Rule { hrule: "", left: "|", mid: "|", right: "|" };

const ASCII: TextFormat = TextFormat {
    rules: [ASCII_RULE, ASCII_RULE, ASCII_RULE, ASCII_DATA],
    midvrule_nl: "|",
    midvrule_wrap: "|",
    midvrule_blank: "|",
    header_nl_left: " ",
    header_nl_right: "+",
    nl_left: " ",
    nl_right: "+",
    wrap_left: ".",
    wrap_right: ".",
    wrap_right_border: true,
    old_ascii: false,
};

const OLD_ASCII: TextFormat = TextFormat {
    rules: [ASCII_RULE, ASCII_RULE, ASCII_RULE, ASCII_DATA],
    midvrule_nl: ":",
    midvrule_wrap: ";",
    midvrule_blank: " ",
    header_nl_left: "+",
    header_nl_right: " ",
    nl_left: " ",
    nl_right: " ",
    wrap_left: " ",
    wrap_right: " ",
    wrap_right_border: false,
    old_ascii: true,
};

/// Box drawing characters for one weight, the pairs are indexed by the weight of the
/// crossing line.
struct BoxChars {
    horizontal: &'static str,
    vertical: &'static str,
    down_and_right: &'static str,
    down_and_left: &'static str,
    up_and_right: &'static str,
    up_and_left: &'static str,
    vertical_and_right: [&'static str; 2],
    vertical_and_left: [&'static str; 2],
    vertical_and_horizontal: [&'static str; 2],
    up_and_horizontal: [&'static str; 2],
    down_and_horizontal: [&'static str; 2],
}

const SINGLE: BoxChars = BoxChars {
    horizontal: "─",
    vertical: "│",
    down_and_right: "┌",
    down_and_left: "┐",
    up_and_right: "└",
    up_and_left: "┘",
    vertical_and_right: ["├", "╟"],
    vertical_and_left: ["┤", "╢"],
    vertical_and_horizontal: ["┼", "╪"],
    up_and_horizontal: ["┴", "╧"],
    down_and_horizontal: ["┬", "╤"],
};

const DOUBLE: BoxChars = BoxChars {
    horizontal: "═",
    vertical: "║",
    down_and_right: "╔",
    down_and_left: "╗",
    up_and_right: "╚",
    up_and_left: "╝",
    vertical_and_right: ["╞", "╠"],
    vertical_and_left: ["╡", "╣"],
    vertical_and_horizontal: ["╫", "╬"],
    up_and_horizontal: ["╨", "╩"],
    down_and_horizontal: ["╥", "╦"],
};

fn box_chars(line: UnicodeLine) -> (&'static BoxChars, usize) {
    match line {
        UnicodeLine::Single => (&SINGLE, 0),
        UnicodeLine::Double => (&DOUBLE, 1),
    }
}

impl TextFormat {
    fn new(opt: &PrintOptions) -> TextFormat {
        match opt.line_style {
            LineStyle::Ascii => ASCII,
            LineStyle::OldAscii => OLD_ASCII,
            LineStyle::Unicode => Self::unicode(opt),
        }
    }

    fn unicode(opt: &PrintOptions) -> TextFormat {
        let (border, b) = box_chars(opt.unicode_border);
        let (header, h) = box_chars(opt.unicode_header);
        let (column, _) = box_chars(opt.unicode_column);
        TextFormat {
            rules: [
                Rule {
                    hrule: border.horizontal,
                    left: border.down_and_right,
                    mid: column.down_and_horizontal[b],
                    right: border.down_and_left,
                },
                Rule {
                    hrule: header.horizontal,
                    left: header.vertical_and_right[b],
                    mid: column.vertical_and_horizontal[h],
                    right: header.vertical_and_left[b],
                },
                Rule {
                    hrule: border.horizontal,
                    left: border.up_and_right,
                    mid: column.up_and_horizontal[b],
                    right: border.up_and_left,
                },
                Rule { hrule: "", left: border.vertical, mid: column.vertical, right: border.vertical },
            ],
            midvrule_nl: column.vertical,
            midvrule_wrap: column.vertical,
            midvrule_blank: column.vertical,
            header_nl_left: " ",
            header_nl_right: "↵",
            nl_left: " ",
            nl_right: "↵",
            wrap_left: "…",
            wrap_right: "…",
            wrap_right_border: true,
            old_ascii: false,
        }
    }

    fn rule(&self, pos: RulePos) -> &Rule {
        &self.rules[pos as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrap {
    None,
    Wrap,
    Newline,
}

fn pad(out: &mut dyn Write, n: usize) -> io::Result<()> {
    write!(out, "{:n$}", "")
}

fn repeat(out: &mut dyn Write, s: &str, n: usize) -> io::Result<()> {
    for _ in 0..n {
        out.write_all(s.as_bytes())?;
    }
    Ok(())
}

fn horizontal_line(
    widths: &[usize],
    border: u8,
    pos: RulePos,
    format: &TextFormat,
    out: &mut dyn Write,
) -> io::Result<()> {
    let rule = format.rule(pos);
    match border {
        1 => write!(out, "{}", rule.hrule)?,
        2 => write!(out, "{}{}", rule.left, rule.hrule)?,
        _ => {}
    }
    for (i, width) in widths.iter().enumerate() {
        repeat(out, rule.hrule, *width)?;
        if i + 1 < widths.len() {
            if border == 0 {
                out.write_all(b" ")?;
            } else {
                write!(out, "{}{}{}", rule.hrule, rule.mid, rule.hrule)?;
            }
        }
    }
    match border {
        1 => write!(out, "{}", rule.hrule)?,
        2 => write!(out, "{}{}", rule.hrule, rule.right)?,
        _ => {}
    }
    out.write_all(b"\n")
}

fn cell(row: &[String], i: usize) -> &str {
    row.get(i).map_or("", String::as_str)
}

/// One row per line with column separators.
pub(super) fn print_text(table: &Table, opt: &PrintOptions, out: &mut dyn Write, output_columns: usize) -> io::Result<()> {
    let border = opt.border.min(2);
    let format = TextFormat::new(opt);
    let data = *format.rule(RulePos::Data);
    let ncol = table.ncolumns();

    let mut width_header = vec![0usize; ncol];
    let mut max_width = vec![0usize; ncol];
    let mut width_average = vec![0usize; ncol];

    for (i, header) in table.headers.iter().enumerate() {
        let (width, _) = super::width::display_size(header);
        width_header[i] = width;
        max_width[i] = width;
    }

    let mut ncells = 0;
    for (i, value) in table.cells().filter(|(i, _)| *i < ncol) {
        let (width, _) = super::width::display_size(value);
        max_width[i] = max_width[i].max(width);
        width_average[i] += width;
        ncells += 1;
    }
    if ncol > 0 && ncells > 0 {
        let rows = ncells / ncol;
        width_average.iter_mut().for_each(|w| *w /= rows.max(1));
    }

    let mut width_total = match border {
        0 => ncol,
        1 => (ncol * 3).saturating_sub(1),
        _ => ncol * 3 + 1,
    };
    let total_header_width = width_total + width_header.iter().sum::<usize>();
    width_total += max_width.iter().sum::<usize>();

    let mut width_wrap = max_width.clone();

    if opt.format == Format::Wrapped && output_columns > 0 && output_columns >= total_header_width {
        while width_total > output_columns {
            let mut max_ratio = 0.0;
            let mut worst = None;
            for i in 0..ncol {
                if width_average[i] > 0 && width_wrap[i] > width_header[i] {
                    // wide columns are penalized by 1% of their width
                    let ratio = width_wrap[i] as f64 / width_average[i] as f64 + max_width[i] as f64 * 0.01;
                    if ratio > max_ratio {
                        max_ratio = ratio;
                        worst = Some(i);
                    }
                }
            }
            let Some(worst) = worst else {
                break;
            };
            width_wrap[worst] -= 1;
            width_total -= 1;
        }
    }

    if opt.expanded == super::Expanded::Auto
        && output_columns > 0
        && ncol > 1
        && (output_columns < total_header_width || output_columns < width_total)
    {
        return print_vertical(table, opt, out, output_columns);
    }

    if opt.start_table {
        if let Some(title) = table.title.as_deref().filter(|_| !opt.tuples_only) {
            let (width, _) = super::width::display_size(title);
            if width >= width_total {
                writeln!(out, "{title}")?;
            } else {
                pad(out, (width_total - width) / 2)?;
                writeln!(out, "{title}")?;
            }
        }

        if !opt.tuples_only {
            if border == 2 {
                horizontal_line(&width_wrap, border, RulePos::Top, &format, out)?;
            }

            let header_lines: Vec<Vec<Line>> = table.headers.iter().map(|h| format_lines(h)).collect();
            let mut done = vec![false; ncol];
            let mut remaining = ncol;
            let mut nl_line = 0;

            while remaining > 0 {
                if border == 2 {
                    out.write_all(data.left.as_bytes())?;
                }
                for i in 0..ncol {
                    if border != 0 || (!format.wrap_right_border && i > 0) {
                        let mark = if nl_line > 0 { format.header_nl_left } else { " " };
                        out.write_all(mark.as_bytes())?;
                    }

                    if !done[i] {
                        let line = &header_lines[i][nl_line];
                        let nbspace = width_wrap[i].saturating_sub(line.width);
                        pad(out, nbspace / 2)?;
                        out.write_all(line.text.as_bytes())?;
                        pad(out, nbspace.div_ceil(2))?;
                        if nl_line + 1 >= header_lines[i].len() {
                            remaining -= 1;
                            done[i] = true;
                        }
                    } else {
                        pad(out, width_wrap[i])?;
                    }

                    if border != 0 || format.wrap_right_border {
                        let mark = if !done[i] { format.header_nl_right } else { " " };
                        out.write_all(mark.as_bytes())?;
                    }

                    if border != 0 && i + 1 < ncol {
                        out.write_all(data.mid.as_bytes())?;
                    }
                }
                nl_line += 1;
                if border == 2 {
                    out.write_all(data.right.as_bytes())?;
                }
                out.write_all(b"\n")?;
            }

            horizontal_line(&width_wrap, border, RulePos::Middle, &format, out)?;
        }
    }

    let mut wrap = vec![Wrap::None; ncol];
    for row in table.rows.iter().filter(|_| ncol > 0) {
        let lines: Vec<Vec<Line>> = (0..ncol).map(|j| format_lines(cell(row, j))).collect();
        let mut curr = vec![0usize; ncol];
        let mut offset = vec![0usize; ncol];

        loop {
            let mut more_lines = false;

            if border == 2 {
                out.write_all(data.left.as_bytes())?;
            }

            for j in 0..ncol {
                let last = j + 1 == ncol;
                let finalspaces = border == 2 || !last;
                let mut chars = width_wrap[j];
                let right = table.aligns.get(j) == Some(&Align::Right);

                if border != 0 {
                    let mark = match wrap[j] {
                        Wrap::Wrap => format.wrap_left,
                        Wrap::Newline => format.nl_left,
                        Wrap::None => " ",
                    };
                    out.write_all(mark.as_bytes())?;
                }

                match lines[j].get(curr[j]) {
                    None => {
                        if finalspaces {
                            pad(out, chars)?;
                        }
                    }
                    Some(line) => {
                        let rest = &line.text[offset[j]..];
                        let (bytes, width) = prefix_to_width(rest, width_wrap[j]);
                        chars = width.min(width_wrap[j]);
                        if right {
                            pad(out, width_wrap[j] - chars)?;
                        }
                        out.write_all(rest[..bytes].as_bytes())?;

                        offset[j] += bytes;
                        if offset[j] < line.text.len() {
                            more_lines = true;
                        } else {
                            curr[j] += 1;
                            if curr[j] < lines[j].len() {
                                more_lines = true;
                            }
                            offset[j] = 0;
                        }
                    }
                }

                wrap[j] = match () {
                    _ if curr[j] >= lines[j].len() => Wrap::None,
                    _ if offset[j] != 0 => Wrap::Wrap,
                    _ if curr[j] != 0 => Wrap::Newline,
                    _ => Wrap::None,
                };

                if !right && (finalspaces || wrap[j] != Wrap::None) {
                    pad(out, width_wrap[j] - chars)?;
                }

                match wrap[j] {
                    Wrap::Wrap => out.write_all(format.wrap_right.as_bytes())?,
                    Wrap::Newline => out.write_all(format.nl_right.as_bytes())?,
                    Wrap::None if finalspaces => out.write_all(b" ")?,
                    Wrap::None => {}
                }

                if border != 0 && !last {
                    let divider = match wrap[j + 1] {
                        Wrap::Wrap => format.midvrule_wrap,
                        Wrap::Newline => format.midvrule_nl,
                        Wrap::None if curr[j + 1] >= lines[j + 1].len() => format.midvrule_blank,
                        Wrap::None => data.mid,
                    };
                    out.write_all(divider.as_bytes())?;
                }
            }

            if border == 2 {
                out.write_all(data.right.as_bytes())?;
            }
            out.write_all(b"\n")?;

            if !more_lines {
                break;
            }
        }
    }

    if opt.stop_table {
        if border == 2 {
            horizontal_line(&width_wrap, border, RulePos::Bottom, &format, out)?;
        }
        if let Some(footers) = table.footers_with_default(opt).filter(|_| !opt.tuples_only) {
            for footer in footers {
                writeln!(out, "{footer}")?;
            }
        }
        out.write_all(b"\n")?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn vertical_line(
    opt: &PrintOptions,
    format: &TextFormat,
    record: u64,
    hwidth: usize,
    dwidth: usize,
    output_columns: usize,
    pos: RulePos,
    out: &mut dyn Write,
) -> io::Result<()> {
    let rule = format.rule(pos);
    let border = opt.border.min(2);
    let fill = if border > 0 { rule.hrule } else { " " };

    match border {
        2 => write!(out, "{}{}", rule.left, rule.hrule)?,
        1 => out.write_all(rule.hrule.as_bytes())?,
        _ => {}
    }

    let mut reclen = 0isize;
    if record > 0 {
        let label = if border == 0 {
            format!("* Record {record}")
        } else {
            format!("[ RECORD {record} ]")
        };
        out.write_all(label.as_bytes())?;
        reclen = label.len() as isize;
    }
    if border != 2 {
        reclen += 1;
    }
    for _ in reclen.max(0)..hwidth as isize {
        out.write_all(fill.as_bytes())?;
    }
    reclen -= hwidth as isize;

    let column = opt.header_width == HeaderWidth::Column;
    if border > 0 {
        if reclen <= 0 {
            out.write_all(rule.hrule.as_bytes())?;
        }
        reclen -= 1;
        if reclen <= 0 {
            out.write_all(if column { rule.right } else { rule.mid }.as_bytes())?;
        }
        reclen -= 1;
        if reclen <= 0 && !column {
            out.write_all(rule.hrule.as_bytes())?;
        }
        reclen -= 1;
    } else {
        if reclen <= 0 {
            out.write_all(b" ")?;
        }
        reclen -= 1;
    }

    if !column {
        let mut dwidth = dwidth as isize;
        let limit = match opt.header_width {
            HeaderWidth::Exact(n) => Some(n as isize),
            HeaderWidth::Page => Some(output_columns as isize),
            _ => None,
        };
        if let Some(limit) = limit.filter(|l| *l > 0) {
            let decoration = [0, 3, 7][border as usize];
            dwidth = dwidth.min((limit - hwidth as isize - decoration).max(0));
        }
        let reclen = reclen.max(0);
        let dwidth = dwidth.max(reclen);
        for _ in reclen..dwidth {
            out.write_all(fill.as_bytes())?;
        }
        if border == 2 {
            write!(out, "{}{}", rule.hrule, rule.right)?;
        }
    }
    out.write_all(b"\n")
}

/// One line per field, records separated by a header line.
pub(super) fn print_vertical(table: &Table, opt: &PrintOptions, out: &mut dyn Write, output_columns: usize) -> io::Result<()> {
    let border = opt.border.min(2);
    let format = TextFormat::new(opt);
    let data = *format.rule(RulePos::Data);
    let ncol = table.ncolumns();
    let old = format.old_ascii;
    let mut record = opt.prior_records + 1;

    if (table.rows.is_empty() || ncol == 0) && opt.start_table && opt.stop_table {
        if let Some(footers) = table.footers_with_default(opt).filter(|_| !opt.tuples_only) {
            for footer in footers {
                writeln!(out, "{footer}")?;
            }
        }
        return out.write_all(b"\n");
    }

    let (mut hwidth, mut hheight, mut hmultiline) = (0, 1, false);
    for header in &table.headers {
        let (width, height) = super::width::display_size(header);
        hwidth = hwidth.max(width);
        if height > hheight {
            hheight = height;
            hmultiline = true;
        }
    }

    let (mut dwidth, mut dheight, mut dmultiline) = (0, 1, false);
    for (_, value) in table.cells().filter(|(i, _)| *i < ncol) {
        let (width, height) = super::width::display_size(value);
        dwidth = dwidth.max(width);
        if height > dheight {
            dheight = height;
            dmultiline = true;
        }
    }

    if opt.start_table && !opt.tuples_only {
        if let Some(title) = &table.title {
            writeln!(out, "{title}")?;
        }
    }

    if opt.format == Format::Wrapped {
        // separator between header and data
        let mut swidth = match border {
            0 => 1 + usize::from(hmultiline),
            1 => 3 + usize::from(hmultiline && old),
            _ => 7,
        };
        if dmultiline && border < 2 && !old {
            swidth += 1;
        }

        let mut rwidth = 0;
        if !opt.tuples_only {
            if !table.rows.is_empty() {
                rwidth = table.rows.len().to_string().len();
            }
            rwidth += [9, 12, 15][border as usize];
        }

        let mut newdwidth;
        loop {
            let width = (hwidth + swidth + dwidth).max(rwidth);
            if output_columns > 0 {
                let min_width = (hwidth + swidth + 3).max(rwidth);
                newdwidth = if output_columns >= width {
                    width - hwidth - swidth
                } else if output_columns < min_width {
                    min_width - hwidth - swidth
                } else {
                    output_columns - hwidth - swidth
                };
            } else {
                newdwidth = width - hwidth - swidth;
            }

            if newdwidth < dwidth && !dmultiline && border < 2 && !old {
                dmultiline = true;
                swidth += 1;
            } else {
                break;
            }
        }
        dwidth = newdwidth;
    }

    for (r, row) in table.rows.iter().enumerate() {
        for (c, header) in table.headers.iter().enumerate() {
            let i = r * ncol + c;
            let pos = if i == 0 { RulePos::Top } else { RulePos::Middle };

            if c == 0 {
                let lhwidth = hwidth + usize::from(border < 2 && hmultiline && old);
                if !opt.tuples_only {
                    vertical_line(opt, &format, record, lhwidth, dwidth, output_columns, pos, out)?;
                    record += 1;
                } else if i != 0 || !opt.start_table || border == 2 {
                    vertical_line(opt, &format, 0, lhwidth, dwidth, output_columns, pos, out)?;
                }
            }

            let hlines = format_lines(header);
            let dlines = format_lines(cell(row, c));
            let (mut hline, mut dline) = (0, 0);
            let (mut hcomplete, mut dcomplete) = (false, false);
            let mut offset = 0;
            let mut chars_to_output = dlines[0].width;

            while !dcomplete || !hcomplete {
                if border == 2 {
                    out.write_all(data.left.as_bytes())?;
                }

                if !hcomplete {
                    if border == 2 || (hmultiline && old) {
                        let mark = if hline > 0 { format.header_nl_left } else { " " };
                        out.write_all(mark.as_bytes())?;
                    }
                    let line = &hlines[hline];
                    out.write_all(line.text.as_bytes())?;
                    pad(out, hwidth.saturating_sub(line.width))?;

                    let marks = border > 0 || (hmultiline && !old);
                    if hline + 1 < hlines.len() {
                        if marks {
                            out.write_all(format.header_nl_right.as_bytes())?;
                        }
                        hline += 1;
                    } else {
                        if marks {
                            out.write_all(b" ")?;
                        }
                        hcomplete = true;
                    }
                } else {
                    let mut swidth = hwidth + border as usize;
                    if border < 2 && hmultiline && old {
                        swidth += 1;
                    }
                    if border == 0 && !old && hmultiline {
                        swidth += 1;
                    }
                    pad(out, swidth.max(1))?;
                }

                if border > 0 {
                    let divider = if offset > 0 {
                        format.midvrule_wrap
                    } else if dline == 0 {
                        data.mid
                    } else {
                        format.midvrule_nl
                    };
                    out.write_all(divider.as_bytes())?;
                }

                if !dcomplete {
                    out.write_all(if offset == 0 { " " } else { format.wrap_left }.as_bytes())?;

                    let line = &dlines[dline];
                    let rest = &line.text[offset..];
                    let (bytes, width) = prefix_to_width(rest, dwidth);
                    out.write_all(rest[..bytes].as_bytes())?;
                    chars_to_output = chars_to_output.saturating_sub(width);
                    offset += bytes;

                    let swidth = dwidth.saturating_sub(width);
                    let marks = border > 1 || (dmultiline && !old);
                    if chars_to_output > 0 && offset < line.text.len() {
                        if marks {
                            pad(out, swidth)?;
                            out.write_all(format.wrap_right.as_bytes())?;
                        }
                    } else if dline + 1 < dlines.len() {
                        if marks {
                            pad(out, swidth)?;
                            out.write_all(format.nl_right.as_bytes())?;
                        }
                        dline += 1;
                        offset = 0;
                        chars_to_output = dlines[dline].width;
                    } else {
                        if border > 1 {
                            pad(out, swidth)?;
                            out.write_all(b" ")?;
                        }
                        dcomplete = true;
                    }

                    if border == 2 {
                        out.write_all(data.right.as_bytes())?;
                    }
                    out.write_all(b"\n")?;
                } else if border < 2 {
                    out.write_all(b"\n")?;
                } else {
                    pad(out, dwidth)?;
                    writeln!(out, "  {}", data.right)?;
                }
            }
        }
    }

    if opt.stop_table {
        if border == 2 {
            vertical_line(opt, &format, 0, hwidth, dwidth, output_columns, RulePos::Bottom, out)?;
        }
        if let Some(footers) = table.footers.as_ref().filter(|_| !opt.tuples_only) {
            if border < 2 {
                out.write_all(b"\n")?;
            }
            for footer in footers {
                writeln!(out, "{footer}")?;
            }
        }
        out.write_all(b"\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::super::test::{render, sample};
    use super::super::*;

    #[test]
    fn aligned_border_one() {
        let out = render(&sample(), &PrintOptions::default());
        assert_eq!(out, " id | name  \n----+-------\n  1 | alice\n 22 | bob\n(2 rows)\n\n");
    }

    #[test]
    fn aligned_border_two() {
        let opt = PrintOptions { border: 2, ..Default::default() };
        let out = render(&sample(), &opt);
        assert_eq!(
            out,
            "+----+-------+\n\
             | id | name  |\n\
             +----+-------+\n\
             |  1 | alice |\n\
             | 22 | bob   |\n\
             +----+-------+\n\
             (2 rows)\n\n"
        );
    }

    #[test]
    fn aligned_border_zero_tuples_only() {
        let opt = PrintOptions { border: 0, tuples_only: true, ..Default::default() };
        let out = render(&sample(), &opt);
        assert_eq!(out, " 1 alice\n22 bob\n\n");
    }

    #[test]
    fn newline_in_cell() {
        let mut table = Table::new(None);
        table.add_header("a", Align::Left);
        table.add_header("b", Align::Left);
        table.add_row(vec!["x\ny".into(), "z".into()]);
        let out = render(&table, &PrintOptions::default());
        assert_eq!(out, " a | b \n---+---\n x+| z\n y | \n(1 row)\n\n");
    }

    #[test]
    fn no_columns() {
        let mut table = Table::new(None);
        table.add_row(vec![]);
        assert_eq!(render(&table, &PrintOptions::default()), "--\n(1 row)\n\n");
    }

    #[test]
    fn title_is_centered() {
        let mut table = sample();
        table.title = Some("T".into());
        let out = render(&table, &PrintOptions::default());
        assert!(out.starts_with("     T\n"));
    }

    #[test]
    fn expanded() {
        let opt = PrintOptions { expanded: Expanded::On, ..Default::default() };
        let out = render(&sample(), &opt);
        assert_eq!(out, "-[ RECORD 1 ]\nid   | 1\nname | alice\n-[ RECORD 2 ]\nid   | 22\nname | bob\n\n");
    }

    #[test]
    fn expanded_empty_shows_footer() {
        let mut table = sample();
        table.rows.clear();
        let opt = PrintOptions { expanded: Expanded::On, ..Default::default() };
        assert_eq!(render(&table, &opt), "(0 rows)\n\n");
    }

    #[test]
    fn wrapped_fits_columns() {
        let mut table = Table::new(None);
        table.add_header("t", Align::Left);
        table.add_row(vec!["abcdefghij".into()]);
        let opt = PrintOptions { format: Format::Wrapped, columns: 8, ..Default::default() };
        let out = render(&table, &opt);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[2], " abcdef.");
        assert_eq!(lines[3], ".ghij");
        assert!(lines.iter().all(|l| super::super::width::str_width(l) <= 8));
    }

    #[test]
    fn unicode_lines() {
        let opt = PrintOptions { border: 2, line_style: LineStyle::Unicode, ..Default::default() };
        let out = render(&sample(), &opt);
        assert!(out.starts_with("┌────┬───────┐\n│ id │ name  │\n├────┼───────┤\n"));
        assert!(out.contains("└────┴───────┘\n"));
    }
}
