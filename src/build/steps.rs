//! The standard step set.
//!
//! | step          | input                            | output            |
//! |---------------|----------------------------------|-------------------|
//! | index         | `source_root/*.html`             | `output_root`     |
//! | common        | `shared_src/**/*.*`              | `shared_out`      |
//! | html          | `html_src/**/*.html`             | `html_out`        |
//! | sprite        | `sprite_input_src/*.png`         | `img_out/sprite`  |
//! | css           | `css_src/*.{scss,css}`           | `css_out`         |
//! | js            | `js_src/*.js`                    | `js_out`          |
//! | images        | `img_src/**/*.{png,gif,jpg,mp4,svg}` | `img_out`     |
//! | sprite-copy   | `sprite_layout_src/**/*.*`       | `sprite_out`      |

use crate::build::context::BuildContext;
use crate::build::graph::{GraphError, StepGraph};
use crate::build::step::{InputSpec, ReloadKind, StepId, TransformStep};
use crate::transforms::{Autoprefix, DropPartials, FileInclude, Minify, OptimizeImages, SassCompile, SpriteSheet};
use thiserror::Error;

const IMAGE_PATTERNS: &[&str] = &["**/*.png", "**/*.gif", "**/*.jpg", "**/*.mp4", "**/*.svg"];

/// Error while assembling the standard steps.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepsError {
    #[error("Invalid include prefix: {0}")]
    IncludePrefix(#[from] regex::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Build the step for `id` from the resolved context.
pub fn make_step(ctx: &BuildContext, id: StepId) -> Result<TransformStep, StepsError> {
    let config = ctx.config();
    let step = match id {
        StepId::Index => TransformStep::new(id, InputSpec::new(ctx.source_root(), &["*.html"]), ctx.output_root()),
        StepId::Common => TransformStep::new(id, InputSpec::new(ctx.shared_src(), &["**/*.*"]), ctx.shared_out()),
        StepId::Html => TransformStep::new(id, InputSpec::new(ctx.html_src(), &["**/*.html"]), ctx.html_out())
            .with_transform(FileInclude::new(&config.html.include_prefix)?)
            .with_transform(DropPartials::new(&config.html.partial_dir)),
        StepId::SpriteGenerate => {
            TransformStep::new(id, InputSpec::new(ctx.sprite_input_src(), &["*.png"]), ctx.sprite_sheet_out())
                .with_transform(SpriteSheet::new(config.sprite.clone(), ctx.sprite_layout_src()))
        }
        StepId::Css => TransformStep::new(id, InputSpec::new(ctx.css_src(), &["*.scss", "*.css"]), ctx.css_out())
            .with_transform(SassCompile::new().with_load_path(ctx.css_src()))
            .with_transform(Autoprefix::new(&config.css))
            .with_reload(true, ReloadKind::InjectCss)
            .depends_on(StepId::SpriteGenerate),
        StepId::Js => TransformStep::new(id, InputSpec::new(ctx.js_src(), &["*.js"]), ctx.js_out())
            .with_transform(Minify)
            .incremental(true),
        StepId::Images => TransformStep::new(id, InputSpec::new(ctx.img_src(), IMAGE_PATTERNS), ctx.img_out())
            .with_transform(OptimizeImages)
            .incremental(true)
            .skip_unchanged_outputs(true),
        StepId::SpriteCopy => {
            TransformStep::new(id, InputSpec::new(ctx.sprite_layout_src(), &["**/*.*"]), ctx.sprite_out())
                .depends_on(StepId::SpriteGenerate)
        }
    };
    Ok(step)
}

/// Build the graph of every standard step, in declaration order.
pub fn standard_steps(ctx: &BuildContext) -> Result<StepGraph, StepsError> {
    let mut graph = StepGraph::new();
    for id in StepId::ALL {
        graph.add_step(make_step(ctx, id)?)?;
    }
    Ok(graph)
}
