//! Lexical class/module context, used to label receiverless calls.

/// Stack of enclosing class/module names. Unresolvable names are kept as
/// `None` so push and pop stay paired.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    frames: Vec<Option<String>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: Option<String>) {
        self.frames.push(name);
    }

    pub fn pop(&mut self) -> Option<Option<String>> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `"#"` at top level, otherwise `"Outer::Inner#"`. Unknown frames
    /// render as empty segments.
    pub fn current_context_label(&self) -> String {
        if self.frames.is_empty() {
            return "#".to_string();
        }
        let joined = self
            .frames
            .iter()
            .map(|f| f.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("::");
        format!("{}#", joined)
    }
}
