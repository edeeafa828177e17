//! Page behavior model shipped with generated sites.
//!
//! - [`layer`] - modal layer open/close state machine
//! - [`scroll`] - header, motion reveal and back-to-top behavior

pub mod layer;
pub mod scroll;

pub use layer::{Click, LayerController, LayerDom, LayerState, MemoryDom};
pub use scroll::{ScrollEffects, ScrollTracker, Viewport};
