//! Modal layer state machine.
//!
//! Layers live inside one container (`.layer-wrap`) and are identified by
//! their `data-layer-name`. At most one layer is open; while it is, page
//! scroll is locked. DOM mutations are delegated to a [`LayerDom`] sink so
//! the state logic can run (and be tested) without a browser.

/// Attribute carrying a layer's logical name, on layers and open triggers.
pub const LAYER_NAME_ATTR: &str = "data-layer-name";
/// Class of elements that open the layer named by their attribute.
pub const OPEN_TRIGGER_CLASS: &str = "js-layer-open";
/// Classes of elements that close the open layer.
pub const CLOSE_TRIGGER_CLASSES: [&str; 2] = ["btn-layer-close", "js-layer-close"];
/// Class of the container holding every layer.
pub const CONTAINER_CLASS: &str = "layer-wrap";
/// Class toggled on the container, the open layer and its close button.
pub const ACTIVE_CLASS: &str = "is-active";
/// Class put on `<body>` while scroll is locked.
pub const SCROLL_LOCK_CLASS: &str = "is-hidden";

/// Side effects of layer transitions.
pub trait LayerDom {
    /// Toggle [`ACTIVE_CLASS`] on the layer container.
    fn set_container_active(&mut self, active: bool);
    /// Toggle [`ACTIVE_CLASS`] on the named layer and its close button.
    fn set_layer_active(&mut self, name: &str, active: bool);
    /// Toggle [`SCROLL_LOCK_CLASS`] on the body.
    fn set_scroll_lock(&mut self, locked: bool);
    /// Scroll the container back to its top.
    fn reset_container_scroll(&mut self);
    /// Drop inline styles left on the container and layers.
    fn clear_inline_styles(&mut self);
}

/// Which layer, if any, is visible.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LayerState {
    #[default]
    Closed,
    Open(String),
}

/// A click, classified by the element it landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Click {
    /// An open trigger carrying a layer name
    Open { name: String },
    /// A close button inside a layer
    Close,
    /// The container outside any layer
    Backdrop,
    /// Anything else
    Other,
}

impl Click {
    /// Classify a click by the target's classes and its `data-layer-name`.
    pub fn classify(classes: &[&str], layer_name: Option<&str>) -> Click {
        if classes.iter().any(|c| CLOSE_TRIGGER_CLASSES.contains(c)) {
            Click::Close
        } else if classes.contains(&OPEN_TRIGGER_CLASS) {
            Click::Open { name: layer_name.unwrap_or_default().to_string() }
        } else if classes.contains(&CONTAINER_CLASS) {
            Click::Backdrop
        } else {
            Click::Other
        }
    }
}

/// Registered layers plus the open/closed state, driving a DOM sink.
#[derive(Debug)]
pub struct LayerController<D: LayerDom> {
    layers: Vec<String>,
    state: LayerState,
    dom: D,
}

impl<D: LayerDom> LayerController<D> {
    pub fn new<I, S>(layers: I, dom: D) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut controller = Self { layers: vec![], state: LayerState::Closed, dom };
        for name in layers {
            controller.register(name);
        }
        controller
    }

    /// Register a layer name; duplicates are ignored.
    pub fn register(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.layers.contains(&name) {
            self.layers.push(name);
        }
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn state(&self) -> &LayerState {
        &self.state
    }

    pub fn is_open(&self, name: &str) -> bool {
        matches!(&self.state, LayerState::Open(open) if open == name)
    }

    /// Scroll lock is held iff a layer is open.
    pub fn scroll_locked(&self) -> bool {
        matches!(self.state, LayerState::Open(_))
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    /// Open `name`, closing whatever was open. An unknown name closes all.
    pub fn open(&mut self, name: &str) {
        if !self.layers.iter().any(|l| l == name) {
            log::debug!("Unknown layer '{}', closing", name);
            self.close();
            return;
        }

        self.dom.set_container_active(true);
        self.dom.set_scroll_lock(true);
        for layer in &self.layers {
            if layer == name {
                self.dom.set_layer_active(layer, true);
                self.dom.reset_container_scroll();
            } else {
                self.dom.set_layer_active(layer, false);
            }
        }
        self.state = LayerState::Open(name.to_string());
    }

    /// Hide the container and every layer and unlock scroll.
    pub fn close(&mut self) {
        self.dom.set_container_active(false);
        for layer in &self.layers {
            self.dom.set_layer_active(layer, false);
        }
        self.dom.clear_inline_styles();
        self.dom.set_scroll_lock(false);
        self.state = LayerState::Closed;
    }

    /// React to a classified click.
    pub fn handle_click(&mut self, click: &Click) {
        match click {
            Click::Open { name } => self.open(name),
            Click::Close | Click::Backdrop => self.close(),
            Click::Other => {}
        }
    }
}

/// In-memory DOM sink recording the visible state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDom {
    pub container_active: bool,
    pub active_layers: Vec<String>,
    pub scroll_locked: bool,
    pub container_scroll_resets: usize,
    pub inline_style_clears: usize,
}

impl LayerDom for MemoryDom {
    fn set_container_active(&mut self, active: bool) {
        self.container_active = active;
    }

    fn set_layer_active(&mut self, name: &str, active: bool) {
        self.active_layers.retain(|l| l != name);
        if active {
            self.active_layers.push(name.to_string());
        }
    }

    fn set_scroll_lock(&mut self, locked: bool) {
        self.scroll_locked = locked;
    }

    fn reset_container_scroll(&mut self) {
        self.container_scroll_resets += 1;
    }

    fn clear_inline_styles(&mut self) {
        self.inline_style_clears += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> LayerController<MemoryDom> {
        LayerController::new(["login", "search"], MemoryDom::default())
    }

    #[test]
    fn test_open_sets_dom_state() {
        let mut layers = controller();
        layers.open("login");

        assert!(layers.is_open("login"));
        let dom = layers.dom();
        assert!(dom.container_active);
        assert!(dom.scroll_locked);
        assert_eq!(dom.active_layers, vec!["login"]);
        assert_eq!(dom.container_scroll_resets, 1);
    }

    #[test]
    fn test_close_clears_everything() {
        let mut layers = controller();
        layers.open("search");
        layers.close();

        assert_eq!(layers.state(), &LayerState::Closed);
        let dom = layers.dom();
        assert!(!dom.container_active);
        assert!(!dom.scroll_locked);
        assert!(dom.active_layers.is_empty());
        assert_eq!(dom.inline_style_clears, 1);
    }

    #[test]
    fn test_register_ignores_duplicates() {
        let mut layers = controller();
        layers.register("login");
        layers.register("cart");
        assert_eq!(layers.layers(), &["login", "search", "cart"]);
    }

    #[test]
    fn test_classify_clicks() {
        assert_eq!(Click::classify(&["btn", "js-layer-open"], Some("cart")), Click::Open { name: "cart".into() });
        assert_eq!(Click::classify(&["btn-layer-close"], None), Click::Close);
        assert_eq!(Click::classify(&["js-layer-close", "js-layer-open"], Some("x")), Click::Close);
        assert_eq!(Click::classify(&["layer-wrap"], None), Click::Backdrop);
        assert_eq!(Click::classify(&["layer"], Some("login")), Click::Other);
    }

    #[test]
    fn test_open_trigger_without_name_closes() {
        let mut layers = controller();
        layers.open("login");
        layers.handle_click(&Click::classify(&["js-layer-open"], None));
        assert_eq!(layers.state(), &LayerState::Closed);
        assert!(!layers.scroll_locked());
    }

    #[test]
    fn test_other_click_keeps_state() {
        let mut layers = controller();
        layers.open("login");
        layers.handle_click(&Click::Other);
        assert!(layers.is_open("login"));
    }
}
