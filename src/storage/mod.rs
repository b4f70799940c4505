//! Storage 模块
//!
//! 词库和规则配置的落盘工具。

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_str, content_hash, file_hash};
