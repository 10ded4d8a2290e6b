//! 可观测性模块
//!
//! 结构化日志初始化。`RUST_LOG` 优先于配置中的日志级别；配置了日志目录时
//! 按天滚动写入文件。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::config::LoggingConfig;
use crate::error::{OrmError, Result};

const LOG_FILE_PREFIX: &str = "polyorm.log";

fn build_filter(level: &str, env_override: Option<String>) -> Result<EnvFilter> {
    let directives = match env_override {
        Some(env) if !env.trim().is_empty() => env,
        _ if level.trim().is_empty() => "info".to_string(),
        _ => level.to_string(),
    };
    EnvFilter::try_new(&directives)
        .map_err(|e| OrmError::Config(format!("invalid log filter {:?}: {}", directives, e)))
}

/// 初始化结构化日志
///
/// 返回文件输出的 guard，调用方需持有到进程退出，否则缓冲日志会丢失。
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.level, std::env::var("RUST_LOG").ok())?;

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.structured {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| OrmError::Config(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}
