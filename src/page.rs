//! The host surface model.
//!
//! A `Page` holds what a capture pipeline can see (containers, canvases,
//! an explicitly registered renderer) and what it may mutate (buttons,
//! floating panels, pending alerts). It is shared behind a mutex; callers
//! must not hold the lock across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capture::{Canvas, RendererHandle};
use crate::overlay::{Anchor, Button, Panel, PanelNode};

pub type PageHandle = Arc<Mutex<Page>>;

/// Locks the page, recovering the data if a previous holder panicked.
pub fn lock_page(page: &PageHandle) -> MutexGuard<'_, Page> {
    page.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct CanvasElement {
    container: Option<String>,
    canvas: Canvas,
}

#[derive(Debug, Default)]
pub struct Page {
    containers: Vec<String>,
    canvases: Vec<CanvasElement>,
    renderer: Option<RendererHandle>,
    buttons: Vec<Button>,
    panels: Vec<Panel>,
    alerts: Vec<String>,
    next_generation: u64,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_handle(self) -> PageHandle {
        Arc::new(Mutex::new(self))
    }

    // ── Capture surfaces ────────────────────────────────────────────

    pub fn add_container(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.has_container(&id) {
            self.containers.push(id);
        }
    }

    pub fn has_container(&self, id: &str) -> bool {
        self.containers.iter().any(|c| c == id)
    }

    /// Adds a canvas, optionally inside a container. The container is
    /// created if it does not exist yet.
    pub fn add_canvas(&mut self, canvas: Canvas, container: Option<&str>) {
        if let Some(id) = container {
            self.add_container(id);
        }
        self.canvases.push(CanvasElement {
            container: container.map(str::to_string),
            canvas,
        });
    }

    /// First canvas in document order inside `container`.
    pub fn first_canvas_in(&self, container: &str) -> Option<&Canvas> {
        self.canvases
            .iter()
            .find(|el| el.container.as_deref() == Some(container))
            .map(|el| &el.canvas)
    }

    /// First canvas anywhere on the page.
    pub fn first_canvas(&self) -> Option<&Canvas> {
        self.canvases.first().map(|el| &el.canvas)
    }

    pub fn canvas(&self, id: &str) -> Option<&Canvas> {
        self.canvases
            .iter()
            .find(|el| el.canvas.id() == id)
            .map(|el| &el.canvas)
    }

    pub fn canvas_count(&self) -> usize {
        self.canvases.len()
    }

    /// Registers the host's 3-D renderer output surface.
    pub fn register_renderer(&mut self, handle: RendererHandle) {
        log::info!(
            "[CAPTURE] Renderer '{}' registered on canvas '{}'",
            handle.name,
            handle.canvas_id
        );
        self.renderer = Some(handle);
    }

    pub fn registered_renderer(&self) -> Option<&RendererHandle> {
        self.renderer.as_ref()
    }

    // ── Buttons ─────────────────────────────────────────────────────

    /// Installs a button unless one with the same id already exists.
    /// Returns `false` if the button was already present.
    pub fn install_button(&mut self, button: Button) -> bool {
        if self.button(&button.id).is_some() {
            return false;
        }
        self.buttons.push(button);
        true
    }

    pub fn button(&self, id: &str) -> Option<&Button> {
        self.buttons.iter().find(|b| b.id == id)
    }

    pub fn button_mut(&mut self, id: &str) -> Option<&mut Button> {
        self.buttons.iter_mut().find(|b| b.id == id)
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    // ── Panels ──────────────────────────────────────────────────────

    pub fn panel(&self, id: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    pub fn panel_mut(&mut self, id: &str) -> Option<&mut Panel> {
        self.panels.iter_mut().find(|p| p.id == id)
    }

    /// Looks a panel up by its stable id, creating an empty one on first use.
    pub fn get_or_create_panel(&mut self, id: &str, anchor: Anchor) -> &mut Panel {
        match self.panels.iter().position(|p| p.id == id) {
            Some(pos) => &mut self.panels[pos],
            None => {
                log::debug!("[PANEL] Creating panel '{}'", id);
                self.panels.push(Panel::new(id, anchor));
                let last = self.panels.len() - 1;
                &mut self.panels[last]
            }
        }
    }

    /// Clears a panel and fills it with `nodes`. Returns the new generation.
    pub fn replace_panel_content(
        &mut self,
        id: &str,
        anchor: Anchor,
        nodes: Vec<PanelNode>,
    ) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        let panel = self.get_or_create_panel(id, anchor);
        panel.nodes = nodes;
        panel.generation = generation;
        generation
    }

    /// Removes a panel, but only if it still carries `generation`.
    pub fn remove_panel_if(&mut self, id: &str, generation: u64) -> bool {
        let before = self.panels.len();
        self.panels
            .retain(|p| !(p.id == id && p.generation == generation));
        before != self.panels.len()
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    // ── Alerts ──────────────────────────────────────────────────────

    /// Queues a blocking alert for the host to show.
    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[PANEL] Alert: {}", message);
        self.alerts.push(message);
    }

    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn canvas(id: &str) -> Canvas {
        Canvas::new(id, RgbaImage::new(2, 2))
    }

    #[test]
    fn first_canvas_in_container_ignores_other_canvases() {
        let mut page = Page::new();
        page.add_canvas(canvas("outside"), None);
        page.add_canvas(canvas("inside-1"), Some("sketch-container"));
        page.add_canvas(canvas("inside-2"), Some("sketch-container"));

        assert_eq!(page.first_canvas().map(Canvas::id), Some("outside"));
        assert_eq!(
            page.first_canvas_in("sketch-container").map(Canvas::id),
            Some("inside-1")
        );
    }

    #[test]
    fn empty_container_has_no_canvas() {
        let mut page = Page::new();
        page.add_container("sketch-container");
        assert!(page.has_container("sketch-container"));
        assert!(page.first_canvas_in("sketch-container").is_none());
    }

    #[test]
    fn install_button_is_idempotent() {
        let mut page = Page::new();
        assert!(page.install_button(Button::new("b", "Go")));
        assert!(!page.install_button(Button::new("b", "Go again")));
        assert_eq!(page.buttons().len(), 1);
        assert_eq!(page.button("b").map(|b| b.label.as_str()), Some("Go"));
    }

    #[test]
    fn panel_is_reused_by_id() {
        let mut page = Page::new();
        let anchor = Anchor::top_right(10, 10);
        page.replace_panel_content("qr", anchor, vec![PanelNode::Text("a".into())]);
        page.replace_panel_content("qr", anchor, vec![PanelNode::Text("b".into())]);

        assert_eq!(page.panels().len(), 1);
        assert_eq!(
            page.panel("qr").map(|p| p.nodes.clone()),
            Some(vec![PanelNode::Text("b".into())])
        );
    }

    #[test]
    fn stale_generation_does_not_remove_panel() {
        let mut page = Page::new();
        let anchor = Anchor::bottom_right(70, 20);
        let first = page.replace_panel_content("result", anchor, Vec::new());
        let second = page.replace_panel_content("result", anchor, Vec::new());

        assert!(!page.remove_panel_if("result", first));
        assert!(page.panel("result").is_some());
        assert!(page.remove_panel_if("result", second));
        assert!(page.panel("result").is_none());
    }

    #[test]
    fn alerts_are_drained() {
        let mut page = Page::new();
        page.alert("Error: boom");
        assert_eq!(page.take_alerts(), vec!["Error: boom".to_string()]);
        assert!(page.take_alerts().is_empty());
    }
}
