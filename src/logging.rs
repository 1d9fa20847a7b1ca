//! 日志初始化
//! 只由可执行程序调用一次；库代码只使用 log 宏

use log::LevelFilter;
use std::path::Path;

/// 单行日志格式：时间、级别、模块、消息
fn format_line(
    out: fern::FormatCallback,
    message: &std::fmt::Arguments,
    record: &log::Record,
) {
    out.finish(format_args!(
        "[{} {} {}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level(),
        record.target(),
        message
    ))
}

/// 输出到 stderr，可选同时追加到日志文件
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(format_line)
        .level(level)
        // HTTP 连接池的调试日志过于嘈杂
        .level_for("hyper_util", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Info)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
