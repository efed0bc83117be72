use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install a file-backed subscriber. A terminal UI owns stdout, so logs go to
/// `log_file`, which [`AppConfig::load`] always fills in when given a settings
/// directory. Keep the returned guard alive until exit so buffered lines get
/// flushed.
pub fn init(cfg: &AppConfig) -> Result<Option<WorkerGuard>> {
    let Some(log_file) = &cfg.log_file else {
        return Ok(None);
    };
    let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = log_file
        .file_name()
        .with_context(|| format!("log_file has no file name: {}", log_file.display()))?;
    std::fs::create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
    let filter = EnvFilter::try_new(&cfg.log_filter)
        .with_context(|| format!("invalid log filter {:?}", cfg.log_filter))?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Ok(Some(guard)),
        // already installed (tests, embedding); drop the guard so the writer shuts down
        Err(_) => Ok(None),
    }
}

pub fn install_panic_hook() {
    static HOOK: std::sync::Once = std::sync::Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "formedit.panic", %info, "panic");
            default_panic(info);
        }));
    });
}
