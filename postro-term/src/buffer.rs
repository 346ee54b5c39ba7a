/// Accumulates SQL text across input lines until it is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuffer {
    text: String,
}

impl QueryBuffer {
    pub fn new() -> QueryBuffer {
        QueryBuffer::default()
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn push(&mut self, ch: char) {
        self.text.push(ch);
    }

    pub fn reset(&mut self) {
        self.text.clear();
    }

    /// Replace the whole content.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Current length in bytes, to be given back to [`truncate_to`][Self::truncate_to].
    pub fn snapshot_len(&self) -> usize {
        self.text.len()
    }

    /// Discard everything appended after `len`.
    ///
    /// `len` must come from [`snapshot_len`][Self::snapshot_len].
    pub fn truncate_to(&mut self, len: usize) {
        if len <= self.text.len() && self.text.is_char_boundary(len) {
            self.text.truncate(len);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn ends_with_newline(&self) -> bool {
        self.text.ends_with('\n')
    }
}

impl std::fmt::Display for QueryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshot_and_truncate() {
        let mut buf = QueryBuffer::new();
        buf.append("select 1");
        let len = buf.snapshot_len();
        buf.append(", 2");
        buf.truncate_to(len);
        assert_eq!(buf.as_str(), "select 1");

        buf.truncate_to(100);
        assert_eq!(buf.as_str(), "select 1");

        buf.reset();
        buf.reset();
        assert!(buf.is_empty());
    }
}
