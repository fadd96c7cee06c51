/// Single-line text editor used by the form fields. The cursor counts
/// characters, not bytes, so accented input and emoji edit correctly.
#[derive(Default, Clone, Debug)]
pub struct LineEdit {
    pub value: String,
    pub cursor: usize,
}

impl LineEdit {
    fn byte_at(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map_or(self.value.len(), |(i, _)| i)
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn set(&mut self, s: impl Into<String>) {
        self.value = s.into();
        self.cursor = self.len();
    }
    pub fn push(&mut self, ch: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, ch);
        self.cursor += 1;
    }
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }
    pub fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }
    pub fn left(&mut self) {
        if self.cursor > 0 { self.cursor -= 1; }
    }
    pub fn right(&mut self) {
        if self.cursor < self.len() { self.cursor += 1; }
    }
    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
    /// Value with a cursor marker, for the field being edited.
    pub fn rendered(&self, editing: bool) -> String {
        if !editing {
            return self.value.clone();
        }
        let at = self.byte_at(self.cursor);
        format!("{}▏{}", &self.value[..at], &self.value[at..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_at_cursor() {
        let mut e = LineEdit::default();
        e.set("ac");
        e.left();
        e.push('b');
        assert_eq!(e.value, "abc");
        e.backspace();
        assert_eq!(e.value, "ac");
        e.delete();
        assert_eq!(e.value, "a");
    }

    #[test]
    fn handles_multibyte_characters() {
        let mut e = LineEdit::default();
        e.set("café");
        e.backspace();
        e.push('é');
        e.push('!');
        assert_eq!(e.value, "café!");
        e.left();
        assert_eq!(e.rendered(true), "café▏!");
        assert_eq!(e.take(), "café!");
        assert!(e.is_blank());
    }
}
