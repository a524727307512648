//! shear -- turns Finder's cut/paste shortcuts into move semantics.
//!
//! Entry point: logging, config, wiring of the macOS backends, main run loop.

#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod app;
mod config;
mod engine;
mod permission;
mod platform;
mod session;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("shear v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(target_os = "macos")]
    run();

    #[cfg(not(target_os = "macos"))]
    {
        log::error!("shear only runs on macOS");
        std::process::exit(1);
    }
}

#[cfg(target_os = "macos")]
fn run() {
    use std::rc::Rc;

    use app::App;
    use config::{Config, FileSettings};
    use engine::ShortcutPipeline;
    use permission::PermissionGate;
    use platform::macos::{
        run_main_loop, MacOSForeground, MacOSInjector, MacOSPermissions, MacOSRetryTimer,
        MacOSTapBackend,
    };
    use session::EventTapSession;

    let path = match config::default_path() {
        Ok(path) => path,
        Err(e) => {
            log::error!("config: {e}");
            std::process::exit(1);
        }
    };
    let config = Config::load(&path).unwrap_or_else(|e| {
        log::warn!("config: {e}; using defaults");
        Config::default()
    });
    log::info!(
        "config: {} ({} = {}, retry every {:?})",
        path.display(),
        config::ShortcutModifier::STORAGE_KEY,
        config.shortcut_modifier.stored_value(),
        config.retry_delay
    );

    let gate = PermissionGate::new(Rc::new(MacOSPermissions));
    let pipeline = ShortcutPipeline::new(
        Box::new(FileSettings::new(path)),
        Box::new(MacOSForeground),
        Box::new(MacOSInjector::new()),
    );
    let session = EventTapSession::new(
        Box::new(MacOSTapBackend::new()),
        Box::new(MacOSRetryTimer),
        gate.clone(),
        pipeline,
        config.retry_delay,
    );

    let app = App::new(session, gate);
    app.launch();
    run_main_loop();
    app.stop();
}
