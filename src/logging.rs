//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 默认日志级别
pub const DEFAULT_LEVEL: &str = "info";

/// 安装全局 fmt subscriber
///
/// `level` 不区分大小写，为空或无法解析时回退到 `info`。
/// 已经安装过 subscriber 时返回 false，不做任何修改。
pub fn init(level: &str) -> bool {
    let filter = build_filter(level);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// 规范化日志级别指令
fn directive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return DEFAULT_LEVEL.to_string();
    }
    level.to_lowercase()
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(directive(level)).unwrap_or_else(|e| {
        tracing::warn!(level, error = %e, "invalid log level, using default");
        EnvFilter::new(DEFAULT_LEVEL)
    })
}
