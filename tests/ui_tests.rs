//! Layer and scroll behavior tests

use frontpipe::ui::layer::{Click, LayerController, LayerState, MemoryDom};
use frontpipe::ui::scroll::{ScrollTracker, Viewport};

fn layers() -> LayerController<MemoryDom> {
    LayerController::new(["A", "B", "C"], MemoryDom::default())
}

#[test]
fn test_opening_second_layer_hides_first() {
    let mut controller = layers();
    controller.open("A");
    controller.open("B");

    assert_eq!(controller.state(), &LayerState::Open("B".to_string()));
    assert_eq!(controller.dom().active_layers, vec!["B"]);
    assert!(controller.dom().container_active);
    assert!(controller.scroll_locked());
}

#[test]
fn test_close_hides_all_and_unlocks() {
    let mut controller = layers();
    controller.open("C");
    controller.close();

    let dom = controller.into_dom();
    assert!(dom.active_layers.is_empty());
    assert!(!dom.container_active);
    assert!(!dom.scroll_locked);
}

#[test]
fn test_open_unknown_equals_close() {
    let mut opened_unknown = layers();
    opened_unknown.open("A");
    opened_unknown.open("nonexistent");

    let mut closed = layers();
    closed.open("A");
    closed.close();

    assert_eq!(opened_unknown.state(), closed.state());
    assert_eq!(opened_unknown.dom(), closed.dom());
}

#[test]
fn test_click_sequence() {
    let mut controller = layers();

    controller.handle_click(&Click::classify(&["btn", "js-layer-open"], Some("A")));
    assert!(controller.is_open("A"));

    controller.handle_click(&Click::classify(&["layer-wrap"], None));
    assert_eq!(controller.state(), &LayerState::Closed);

    controller.handle_click(&Click::classify(&["js-layer-open"], Some("B")));
    controller.handle_click(&Click::classify(&["btn-layer-close"], None));
    assert!(!controller.scroll_locked());
}

#[test]
fn test_scroll_reveals_in_page_order() {
    let viewport = Viewport { width: 1024.0, height: 600.0 };
    let mut tracker = ScrollTracker::new(viewport, &[300.0, 900.0, 1800.0]);

    assert_eq!(tracker.on_scroll(0.0).revealed, vec![0]);
    assert_eq!(tracker.on_scroll(600.0).revealed, vec![1]);
    assert_eq!(tracker.on_scroll(1500.0).revealed, vec![2]);
    assert!(tracker.items().iter().all(|item| item.is_active()));
}
