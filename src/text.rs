//! 文本预处理
//!
//! 去除 HTML 标签和链接并压缩空白，用于情感分析前的清洗。
//! 审核引擎始终使用原文，不经过这里。

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid url pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// 清洗文本
pub fn clean(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = URL.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
