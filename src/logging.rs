use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// 初始化日志系统
///
/// 指定 `log_file` 时输出到按天滚动的文件（非阻塞写入），返回的 guard
/// 必须在进程退出前一直持有，否则缓冲中的日志会丢失。
pub fn init_logging(
    log_level: &str,
    log_format: Option<&str>,
    log_file: Option<&str>,
    quiet: bool,
) -> Result<Option<WorkerGuard>> {
    // 静默模式只输出错误
    let level = if quiet { "error" } else { log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard, ansi) = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let file_name = path
                .file_name()
                .with_context(|| format!("无效的日志文件路径: {:?}", path))?;
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), None, true),
    };

    let fmt_layer = fmt::layer().with_writer(writer).with_ansi(ansi);

    // 根据格式选择不同的输出方式
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match log_format {
        // JSON 格式（适合生产环境）
        Some("json") => fmt_layer.json().boxed(),
        // Pretty 格式（适合开发环境）
        Some("pretty") | Some("dev") => fmt_layer.pretty().boxed(),
        // Compact 格式（默认）
        _ => fmt_layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()
        .context("日志系统初始化失败")?;

    Ok(guard)
}
