//! Build command implementations (clean, build, dev)

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, Pipeline};
use crate::config::loader::load_project;
use crate::server::{DevServer, ReloadHub};
use crate::watch::WatchRouter;

/// Load the project around the working directory into a build context.
fn load_context() -> Result<BuildContext, ExitCode> {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("Error: cannot read working directory: {}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
    };
    context_for(&cwd)
}

fn context_for(start: &Path) -> Result<BuildContext, ExitCode> {
    match load_project(start) {
        Ok(loaded) => {
            match &loaded.source {
                Some(path) => log::debug!("Using config: {}", path.display()),
                None => log::debug!("No frontpipe.toml found, using defaults"),
            }
            Ok(BuildContext::new(loaded.config, loaded.project_root))
        }
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            Err(ExitCode::from(EXIT_ERROR))
        }
    }
}

fn create_pipeline(ctx: BuildContext) -> Result<Pipeline, ExitCode> {
    Pipeline::new(ctx).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })
}

/// Run the clean command
pub fn run_clean() -> ExitCode {
    let pipeline = match load_context().and_then(create_pipeline) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match pipeline.clean() {
        Ok(true) => {
            println!("Removed {}", pipeline.context().output_root().display());
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(false) => {
            println!("Nothing to clean");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the build command
pub fn run_build() -> ExitCode {
    let pipeline = match load_context().and_then(create_pipeline) {
        Ok(p) => p,
        Err(code) => return code,
    };
    ExitCode::from(build_once(&pipeline))
}

/// Build once and return the exit status.
fn build_once(pipeline: &Pipeline) -> u8 {
    match pipeline.build() {
        Ok(result) => {
            println!("{}", result.summary());
            if result.is_success() {
                EXIT_SUCCESS
            } else {
                EXIT_ERROR
            }
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            EXIT_ERROR
        }
    }
}

/// Run the dev command: build, serve, then watch until interrupted.
pub fn run_dev() -> ExitCode {
    let ctx = match load_context() {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    let hub = ReloadHub::default();
    let pipeline = match create_pipeline(ctx.clone()) {
        Ok(p) => p.with_reload(Arc::new(hub.clone())),
        Err(code) => return code,
    };

    // Compile errors are reported but do not stop the dev loop
    match pipeline.build() {
        Ok(result) => println!("{}", result.summary()),
        Err(e) => {
            eprintln!("Build failed: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    if let Err(code) = start_server(&ctx, hub) {
        return ExitCode::from(code);
    }

    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    match WatchRouter::from_context(&ctx).run(&pipeline, debounce) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Bind the dev server, then serve it on its own thread.
///
/// Binding happens on the calling thread; a taken port is an error here.
fn start_server(ctx: &BuildContext, hub: ReloadHub) -> Result<thread::JoinHandle<()>, u8> {
    let server = DevServer::new(ctx.output_root(), &ctx.config().server, hub);
    let addr = server.addr().to_string();
    let bound = server.bind_blocking().map_err(|e| {
        eprintln!("Error: {}", e);
        EXIT_ERROR
    })?;
    println!("Dev server: http://{}", addr);

    thread::Builder::new()
        .name("dev-server".to_string())
        .spawn(move || {
            if let Err(e) = bound.serve_blocking() {
                log::error!("Dev server stopped: {}", e);
            }
        })
        .map_err(|e| {
            eprintln!("Error: cannot start dev server: {}", e);
            EXIT_ERROR
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_context_defaults_without_config() {
        let temp = TempDir::new().unwrap();
        let ctx = context_for(temp.path()).unwrap();
        assert_eq!(ctx.project_root(), temp.path());
        assert_eq!(ctx.config().server.port, 5500);
    }

    #[test]
    fn test_context_rejects_invalid_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("frontpipe.toml"), "[paths]\ncss_out = \"elsewhere/css\"\n").unwrap();
        assert!(context_for(temp.path()).is_err());
    }

    #[test]
    fn test_build_once_on_empty_project() {
        let temp = TempDir::new().unwrap();
        let pipeline = create_pipeline(context_for(temp.path()).unwrap()).unwrap();
        assert_eq!(build_once(&pipeline), EXIT_SUCCESS);
    }

    #[test]
    fn test_start_server_fails_when_port_taken() {
        let temp = TempDir::new().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = crate::config::default_config();
        config.server.port = taken.local_addr().unwrap().port();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());

        let result = start_server(&ctx, ReloadHub::default());
        assert!(matches!(result, Err(code) if code == EXIT_ERROR));
    }

    #[test]
    fn test_build_once_fails_on_compile_error() {
        let temp = TempDir::new().unwrap();
        let ctx = context_for(temp.path()).unwrap();
        fs::create_dir_all(ctx.css_src()).unwrap();
        fs::write(ctx.css_src().join("broken.scss"), "a { color: ").unwrap();

        let pipeline = create_pipeline(ctx).unwrap();
        assert_eq!(build_once(&pipeline), EXIT_ERROR);
    }
}
