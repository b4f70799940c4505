//! Screening 错误类型定义

use std::any::Any;

use thiserror::Error;

/// Screening 错误类型
#[derive(Debug, Error)]
pub enum ScreeningError {
    /// 无效的正则表达式模式
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// 规则或词条校验失败
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 分词器执行失败
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// 情感分类器执行失败
    #[error("Classification failed: {0}")]
    Classification(String),

    /// 共享状态锁被毒化
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// 文件读写错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 配置文件错误
    #[error("Config error: {0}")]
    Config(String),
}

impl ScreeningError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// 提取 panic 负载中的消息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
