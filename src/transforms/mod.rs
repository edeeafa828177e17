//! Batch transformations plugged into pipeline steps.
//!
//! # Module Structure
//!
//! - [`html`] - `@@include` expansion and partial removal
//! - [`css`] - Sass compilation and vendor prefixing
//! - [`js`] - Comment and whitespace stripping
//! - [`imagemin`] - Lossless PNG re-encoding
//! - [`sprite`] - Sprite sheet packing and stylesheet fragment

pub mod css;
pub mod html;
pub mod imagemin;
pub mod js;
pub mod sprite;

pub use css::{Autoprefix, SassCompile};
pub use html::{DropPartials, FileInclude, IncludeError};
pub use imagemin::OptimizeImages;
pub use js::Minify;
pub use sprite::SpriteSheet;
