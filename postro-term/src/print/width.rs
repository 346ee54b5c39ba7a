//! Display width of text on a terminal.
//!
//! Wide East Asian characters take two cells, combining marks take none. Control characters
//! are shown escaped: `\r` literally, others as `\xNN` or `\uNNNN`, and a tab expands to the
//! next multiple of eight.
use unicode_width::UnicodeWidthChar;

/// One display line of a formatted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub width: usize,
}

/// Cells taken by `c`, `None` for control characters.
pub fn char_width(c: char) -> Option<usize> {
    match c {
        '\0' => Some(0),
        c if c.is_control() => None,
        c => Some(UnicodeWidthChar::width(c).unwrap_or(0)),
    }
}

/// Split `s` into display lines, escaping control characters.
pub fn format_lines(s: &str) -> Vec<Line> {
    let mut lines = vec![];
    let mut cur = Line { text: String::new(), width: 0 };

    for c in s.chars() {
        match c {
            '\n' => lines.push(std::mem::replace(&mut cur, Line { text: String::new(), width: 0 })),
            '\t' => loop {
                cur.text.push(' ');
                cur.width += 1;
                if cur.width % 8 == 0 {
                    break;
                }
            },
            '\r' => {
                cur.text.push_str("\\r");
                cur.width += 2;
            }
            _ => match char_width(c) {
                Some(w) => {
                    cur.text.push(c);
                    cur.width += w;
                }
                None => {
                    let escaped = escape_control(c);
                    cur.width += escaped.len();
                    cur.text.push_str(&escaped);
                }
            },
        }
    }
    lines.push(cur);
    lines
}

fn escape_control(c: char) -> String {
    match c as u32 {
        ucs @ 0..=0xff => format!("\\x{ucs:02X}"),
        ucs @ 0x100..=0xffff => format!("\\u{ucs:04X}"),
        ucs => format!("\\U{ucs:08X}"),
    }
}

/// Widest line and number of lines of `s` once formatted.
pub fn display_size(s: &str) -> (usize, usize) {
    let lines = format_lines(s);
    let width = lines.iter().map(|l| l.width).max().unwrap_or(0);
    (width, lines.len())
}

/// Width of a single formatted line.
pub fn str_width(s: &str) -> usize {
    s.chars().map(|c| char_width(c).unwrap_or(0)).sum()
}

/// Longest prefix of `s` fitting in `target` cells, as `(bytes, cells)`.
///
/// At least one character is taken even when it is wider than `target`.
pub fn prefix_to_width(s: &str, target: usize) -> (usize, usize) {
    let mut width = 0;
    for (i, c) in s.char_indices() {
        let w = char_width(c).unwrap_or(0);
        if target < width + w && width != 0 {
            return (i, width);
        }
        width += w;
    }
    (s.len(), width)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(char_width('a'), Some(1));
        assert_eq!(char_width('日'), Some(2));
        assert_eq!(char_width('\u{301}'), Some(0));
        assert_eq!(char_width('\u{7}'), None);
        assert_eq!(str_width("e\u{301}日"), 3);
        assert_eq!(char_width('\u{200b}'), Some(0));
    }

    #[test]
    fn emoji_are_wide() {
        for c in ['\u{1f680}', '\u{1f6d1}', '\u{1f004}', '\u{2705}'] {
            assert_eq!(char_width(c), Some(2), "{c}");
        }
        assert_eq!(str_width("ok \u{2705}"), 5);
        assert_eq!(prefix_to_width("\u{1f680}\u{1f680}", 3), (4, 2));
    }

    #[test]
    fn lines_and_escapes() {
        let lines = format_lines("a\tb\nc\rd\u{1}");
        assert_eq!(lines[0], Line { text: "a       b".into(), width: 9 });
        assert_eq!(lines[1], Line { text: "c\\rd\\x01".into(), width: 8 });
        assert_eq!(display_size("ab\nabcd\n"), (4, 3));
    }

    #[test]
    fn prefix() {
        assert_eq!(prefix_to_width("abcdef", 4), (4, 4));
        assert_eq!(prefix_to_width("日本語", 3), (3, 2));
        assert_eq!(prefix_to_width("日", 1), (3, 2));
        assert_eq!(prefix_to_width("ab", 10), (2, 2));
    }
}
