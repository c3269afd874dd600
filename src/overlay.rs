//! Floating overlay widgets: trigger buttons and result panels.
//!
//! These are plain data. A host renders them however it likes; the CLI
//! prints them through the `Display` impls below.

use image::GrayImage;
use std::fmt;

/// Fixed-position placement, in logical pixels from the viewport edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub top: Option<u32>,
    pub bottom: Option<u32>,
    pub right: u32,
}

impl Anchor {
    pub const fn top_right(top: u32, right: u32) -> Self {
        Self {
            top: Some(top),
            bottom: None,
            right,
        }
    }

    pub const fn bottom_right(bottom: u32, right: u32) -> Self {
        Self {
            top: None,
            bottom: Some(bottom),
            right,
        }
    }
}

/// Where every trigger button sits.
pub const BUTTON_ANCHOR: Anchor = Anchor::bottom_right(20, 20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub label: String,
    pub disabled: bool,
    pub anchor: Anchor,
}

impl Button {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            disabled: false,
            anchor: BUTTON_ANCHOR,
        }
    }
}

/// A hyperlink node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
    /// Suggested filename when the link is saved rather than followed.
    pub download: Option<String>,
    /// Open in a new browsing context.
    pub new_context: bool,
}

/// An image preview scaled down to fit a bounding box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub src: String,
    pub natural_size: (u32, u32),
    pub max_size: (u32, u32),
}

impl Preview {
    /// Displayed size: the natural size, shrunk uniformly until it fits
    /// `max_size`. Never scaled up.
    pub fn displayed_size(&self) -> (u32, u32) {
        let (w, h) = self.natural_size;
        let (max_w, max_h) = self.max_size;
        if w == 0 || h == 0 || (w <= max_w && h <= max_h) {
            return (w, h);
        }

        let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
        let scaled_w = ((w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
        let scaled_h = ((h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
        (scaled_w, scaled_h)
    }
}

/// A rendered QR symbol plus the text it encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct QrImage {
    pub payload: String,
    pub image: GrayImage,
    /// Terminal rendering of the same symbol.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelNode {
    Text(String),
    ErrorText(String),
    QrCode(QrImage),
    Link(Link),
    Preview(Preview),
    CopyButton { label: String },
}

/// A floating result panel. Replacing its content bumps `generation`, so
/// timers armed for older content can tell they are stale.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: String,
    pub anchor: Anchor,
    pub nodes: Vec<PanelNode>,
    pub generation: u64,
}

impl Panel {
    pub fn new(id: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            id: id.into(),
            anchor,
            nodes: Vec::new(),
            generation: 0,
        }
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PanelNode) -> bool,
    {
        self.nodes.iter().filter(|n| predicate(n)).count()
    }

    pub fn copy_button_label(&self) -> Option<&str> {
        self.nodes.iter().find_map(|n| match n {
            PanelNode::CopyButton { label } => Some(label.as_str()),
            _ => None,
        })
    }

    pub fn set_copy_button_label(&mut self, new_label: &str) -> bool {
        for node in &mut self.nodes {
            if let PanelNode::CopyButton { label } = node {
                *label = new_label.to_string();
                return true;
            }
        }
        false
    }

    /// The first link that opens in a new browsing context.
    pub fn external_link(&self) -> Option<&Link> {
        self.nodes.iter().find_map(|n| match n {
            PanelNode::Link(link) if link.new_context => Some(link),
            _ => None,
        })
    }
}

impl fmt::Display for PanelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelNode::Text(text) => write!(f, "{}", text),
            PanelNode::ErrorText(text) => write!(f, "{}", text),
            PanelNode::QrCode(qr) => write!(f, "{}", qr.text),
            PanelNode::Link(link) if link.href.starts_with("data:") => {
                // Data URLs are too long to be useful on a terminal.
                write!(f, "[{}] ({} byte data URL)", link.text, link.href.len())
            }
            PanelNode::Link(link) if link.text == link.href => write!(f, "{}", link.href),
            PanelNode::Link(link) => write!(f, "[{}] {}", link.text, link.href),
            PanelNode::Preview(preview) => {
                let (w, h) = preview.displayed_size();
                write!(f, "[preview {}x{}]", w, h)
            }
            PanelNode::CopyButton { label } => write!(f, "[{}]", label),
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes = self.nodes.iter().peekable();
        while let Some(node) = nodes.next() {
            let inline_next = matches!(nodes.peek(), Some(PanelNode::CopyButton { .. }));
            match node {
                // Inline nodes share a line with whatever follows.
                PanelNode::Text(_) => write!(f, "{}", node)?,
                PanelNode::CopyButton { .. } => writeln!(f, " {}", node)?,
                _ if inline_next => write!(f, "{}", node)?,
                _ => writeln!(f, "{}", node)?,
            }
        }
        Ok(())
    }
}
