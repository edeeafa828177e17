//! Build pipeline module for frontpipe
//!
//! Turns the `sources/` tree into the `dist/` tree through a graph of
//! transform steps.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find input files using glob patterns per step
//! - **Steps**: Read, transform and write one asset category each
//! - **Graph**: Order steps by their dependencies and group them in levels
//! - **Incremental**: Skip inputs unchanged since the step's last run
//!
//! # Example
//!
//! ```ignore
//! use frontpipe::build::{BuildContext, Pipeline};
//! use frontpipe::config::load_project;
//!
//! let loaded = load_project(&std::env::current_dir()?)?;
//! let context = BuildContext::new(loaded.config, loaded.project_root);
//! let pipeline = Pipeline::new(context)?;
//!
//! let result = pipeline.build()?;
//! println!("{}", result.summary());
//! ```

pub mod clean;
pub mod context;
pub mod discovery;
pub mod graph;
pub mod incremental;
pub mod pipeline;
pub mod result;
pub mod step;
pub mod steps;

pub use clean::*;
pub use context::*;
pub use discovery::*;
pub use graph::*;
pub use incremental::*;
pub use pipeline::*;
pub use result::*;
pub use step::*;
pub use steps::*;
