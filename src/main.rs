use std::path::{Path, PathBuf};

use admin_grid::app::App;
use admin_grid::infra::settings::{load_settings, save_settings, settings_path, GridSettings};
use admin_grid::platform::desktop::logging::init_logging;
use anyhow::{anyhow, Context, Result};
use dioxus::prelude::*;
use directories::ProjectDirs;

fn main() {
    let settings = load_settings();
    init_logging(&settings.log_level);
    if settings_path().is_some_and(|path| !path.exists()) {
        if let Err(err) = save_settings(&settings) {
            tracing::warn!(error = %err, "failed to write default settings");
        }
    }

    let mut config = dioxus::desktop::Config::new()
        .with_window(dioxus::desktop::WindowBuilder::new().with_title("Admin Grid"));
    match default_webview_data_dir() {
        Ok(dir) => config = config.with_data_directory(dir),
        Err(err) => tracing::warn!(error = %err, "using default webview data directory"),
    }

    dioxus::LaunchBuilder::desktop()
        .with_cfg(config)
        .with_context(settings)
        .launch(Root);
}

#[component]
fn Root() -> Element {
    let settings = use_context::<GridSettings>();
    rsx! {
        App { settings }
    }
}

fn ensure_webview_data_dir(base_data_dir: &Path) -> Result<PathBuf> {
    let webview_data_dir = base_data_dir.join("webview2");
    std::fs::create_dir_all(&webview_data_dir).with_context(|| {
        format!(
            "failed to create webview dir: {}",
            webview_data_dir.display()
        )
    })?;
    Ok(webview_data_dir)
}

fn default_webview_data_dir() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("com", "hellhbbd", "admin-grid")
        .ok_or_else(|| anyhow!("unable to resolve data directory"))?;
    ensure_webview_data_dir(project_dirs.data_local_dir())
}
