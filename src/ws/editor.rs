//! The rich-text surface a collaborative session drives.
//!
//! Content is handled as one serialized string (HTML for the web editor).
//! A session only needs three capabilities from an editor: read the
//! content, replace it, and be told when the user changed it.

/// Callback invoked with the full content after a user edit.
pub type ChangeListener = Box<dyn FnMut(&str) + Send>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetContentOptions {
    /// Keep the caret/selection where it was, clamped to the new content.
    pub preserve_selection: bool,
}

impl SetContentOptions {
    pub fn preserving_selection() -> Self {
        Self { preserve_selection: true }
    }
}

pub trait DocumentEditor {
    fn get_content(&self) -> String;

    /// Replace the whole content. Must not notify change listeners.
    fn set_content(&mut self, content: &str, options: SetContentOptions);

    fn on_change(&mut self, listener: ChangeListener);
}

/// Selection as character offsets; `anchor == head` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn caret(at: usize) -> Self {
        Self { anchor: at, head: at }
    }

    fn clamped(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }

    fn ordered(self) -> (usize, usize) {
        (self.anchor.min(self.head), self.anchor.max(self.head))
    }
}

/// In-memory editor used by headless sessions and tests.
#[derive(Default)]
pub struct BufferEditor {
    content: String,
    selection: Option<Selection>,
    listeners: Vec<ChangeListener>,
}

impl BufferEditor {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            selection: None,
            listeners: Vec::new(),
        }
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Place the selection, clamped to the current content.
    pub fn select(&mut self, anchor: usize, head: usize) {
        let len = self.char_len();
        self.selection = Some(Selection { anchor, head }.clamped(len));
    }

    /// User typing: replace the selection (or append when there is none) and
    /// notify listeners.
    pub fn type_text(&mut self, text: &str) {
        let len = self.char_len();
        let (start, end) = self
            .selection
            .map(Selection::ordered)
            .unwrap_or((len, len));

        let start_byte = self.byte_offset(start);
        let end_byte = self.byte_offset(end);
        self.content.replace_range(start_byte..end_byte, text);
        self.selection = Some(Selection::caret(start + text.chars().count()));
        self.notify();
    }

    fn notify(&mut self) {
        let content = self.content.clone();
        for listener in self.listeners.iter_mut() {
            listener(&content);
        }
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_idx: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_idx)
            .map(|(idx, _)| idx)
            .unwrap_or(self.content.len())
    }
}

impl DocumentEditor for BufferEditor {
    fn get_content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, content: &str, options: SetContentOptions) {
        self.content = content.to_string();
        let len = self.char_len();
        self.selection = if options.preserve_selection {
            self.selection.map(|s| s.clamped(len))
        } else {
            None
        };
    }

    fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }
}
