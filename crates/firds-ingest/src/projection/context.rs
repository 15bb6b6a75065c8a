//! Ancestor stack maintained while streaming

/// Reduce a qualified tag name to its local part
///
/// Handles both the Clark notation `{uri}local` and prefixed `ns:local` names.
pub fn strip_namespace(name: &str) -> &str {
    if name.starts_with('{') {
        if let Some(end) = name.find('}') {
            return &name[end + 1..];
        }
    }
    match name.rfind(':') {
        Some(colon) => &name[colon + 1..],
        None => name,
    }
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) tag: String,
    // Text before the first child element
    pub(crate) text: String,
    has_children: bool,
}

/// Open elements from the root to the innermost, innermost last
///
/// Each frame keeps its element's leading text until the element closes; a
/// popped frame is dropped by the caller, so memory is bounded by depth.
#[derive(Debug, Default)]
pub struct ElementContext {
    frames: Vec<Frame>,
}

impl ElementContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, tag: String) {
        if let Some(parent) = self.frames.last_mut() {
            parent.has_children = true;
        }
        self.frames.push(Frame {
            tag,
            text: String::new(),
            has_children: false,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub(crate) fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Append character data to the innermost element, if it has no children yet
    pub(crate) fn append_text(&mut self, text: &str) {
        if let Some(frame) = self.frames.last_mut() {
            if !frame.has_children {
                frame.text.push_str(text);
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Tag `n` levels up from the innermost (0 = innermost)
    pub fn ancestor(&self, n: usize) -> Option<&str> {
        let index = self.frames.len().checked_sub(n + 1)?;
        self.frames.get(index).map(|frame| frame.tag.as_str())
    }

    pub fn innermost(&self) -> Option<&str> {
        self.ancestor(0)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|frame| frame.tag.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("{http://example.org/ns}Issr"), "Issr");
        assert_eq!(strip_namespace("auth:Issr"), "Issr");
        assert_eq!(strip_namespace("Issr"), "Issr");
        assert_eq!(strip_namespace("{unterminated"), "{unterminated");
    }

    #[test]
    fn test_ancestors() {
        let mut context = ElementContext::new();
        context.push("Document".to_string());
        context.push("FinInstrm".to_string());
        context.push("Id".to_string());

        assert_eq!(context.depth(), 3);
        assert_eq!(context.innermost(), Some("Id"));
        assert_eq!(context.ancestor(1), Some("FinInstrm"));
        assert_eq!(context.ancestor(2), Some("Document"));
        assert_eq!(context.ancestor(3), None);
        assert_eq!(context.tags().collect::<Vec<_>>(), ["Document", "FinInstrm", "Id"]);
    }

    #[test]
    fn test_text_stops_at_first_child() {
        let mut context = ElementContext::new();
        context.push("Parent".to_string());
        context.append_text("lead");
        context.push("Child".to_string());
        context.append_text("inner");
        let child = context.pop();
        context.append_text("tail");

        assert_eq!(child.map(|f| f.text), Some("inner".to_string()));
        assert_eq!(context.top().map(|f| f.text.as_str()), Some("lead"));
    }
}
