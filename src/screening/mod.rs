//! Screening 模块 - 评论内容审核引擎
//!
//! 敏感词匹配 + 结构化规则 (手机号、身份证号、URL、邮箱、银行卡号) + 长度校验。
//! 词库和规则可在运行时修改，审核调用之间共享同一份状态。

mod cache;
mod config;
mod engine;
mod error;
mod matcher;
mod patterns;
mod segment;
mod vocabulary;

pub use cache::{CacheStats, TokenCache, Tokens};
pub use config::{RulesConfig, RULES_FILENAME};
pub use engine::{BatchVerdict, EngineOptions, EngineStats, ScreeningEngine, Verdict};
pub use error::ScreeningError;
pub(crate) use error::panic_message;
pub use matcher::{check_length, scan_patterns, scan_words, Violation, DEFAULT_MIN_LENGTH};
pub use patterns::{
    validate_regex_pattern, Boundary, PatternRegistry, PatternRule, RuleDefinition, RuleSnapshot,
    BUILTIN_RULES,
};
pub use segment::{DictionarySegmenter, Segmenter};
pub use vocabulary::{Vocabulary, VocabularyFormat, VocabularySource, DEFAULT_WORDS};
