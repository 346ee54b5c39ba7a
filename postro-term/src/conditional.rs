//! `\if` block state.

/// State of one `\if` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfState {
    /// Not inside any `\if` block.
    None,
    /// Current branch is taken.
    True,
    /// No branch taken yet, current one is skipped.
    False,
    /// Block is skipped entirely, or a previous branch was already taken.
    Ignored,
    /// Reached `\else` with no branch taken before.
    ElseTrue,
    /// Reached `\else` after a taken branch.
    ElseFalse,
}

impl IfState {
    fn is_active(self) -> bool {
        matches!(self, IfState::None | IfState::True | IfState::ElseTrue)
    }
}

#[derive(Debug, Clone)]
struct Frame {
    state: IfState,
    query_len: usize,
    paren_depth: usize,
}

/// Nested `\if` blocks, innermost last.
///
/// Each frame remembers the query buffer length and parenthesis depth at the start of the
/// current branch, so text accumulated by a skipped branch can be discarded.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<Frame>,
}

impl ConditionalStack {
    pub fn new() -> ConditionalStack {
        ConditionalStack::default()
    }

    pub fn push(&mut self, state: IfState) {
        self.frames.push(Frame { state, query_len: 0, paren_depth: 0 });
    }

    /// Remove the innermost frame, `false` if there was none.
    pub fn pop(&mut self) -> bool {
        self.frames.pop().is_some()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn peek(&self) -> IfState {
        self.frames.last().map_or(IfState::None, |f| f.state)
    }

    /// Replace the state of the innermost frame, `false` if there is none.
    pub fn poke(&mut self, state: IfState) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.state = state;
                true
            }
            None => false,
        }
    }

    /// Every enclosing branch is taken.
    ///
    /// Nested frames below an inactive one are always [`IfState::Ignored`], so only the
    /// innermost frame needs checking.
    pub fn is_active(&self) -> bool {
        self.peek().is_active()
    }

    /// Remember the branch start.
    pub fn save(&mut self, query_len: usize, paren_depth: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.query_len = query_len;
            frame.paren_depth = paren_depth;
        }
    }

    /// Query buffer length at the branch start.
    pub fn query_len(&self) -> Option<usize> {
        self.frames.last().map(|f| f.query_len)
    }

    pub fn paren_depth(&self) -> Option<usize> {
        self.frames.last().map(|f| f.paren_depth)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn activity() {
        let mut stack = ConditionalStack::new();
        assert!(stack.is_active());
        assert_eq!(stack.peek(), IfState::None);

        stack.push(IfState::True);
        assert!(stack.is_active());
        stack.push(IfState::False);
        assert!(!stack.is_active());
        stack.push(IfState::Ignored);
        assert!(!stack.is_active());
        assert_eq!(stack.depth(), 3);

        assert!(stack.pop());
        assert!(stack.poke(IfState::ElseTrue));
        assert!(stack.is_active());
        assert!(stack.pop());
        assert!(stack.pop());
        assert!(!stack.pop());
        assert!(!stack.poke(IfState::True));
    }

    #[test]
    fn saved_branch_start() {
        let mut stack = ConditionalStack::new();
        assert_eq!(stack.query_len(), None);
        stack.push(IfState::False);
        stack.save(12, 1);
        assert_eq!(stack.query_len(), Some(12));
        assert_eq!(stack.paren_depth(), Some(1));
    }
}
