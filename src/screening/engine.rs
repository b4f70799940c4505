//! 内容审核引擎
//!
//! 组合分词缓存、敏感词库、规则注册表和长度校验，产出可解释的审核结论。
//! 所有公开操作都返回完整结果，不会向调用方抛出错误或 panic。

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cache::{CacheStats, TokenCache};
use super::config::RulesConfig;
use super::error::{panic_message, ScreeningError};
use super::matcher::{check_length, scan_patterns, scan_words, Violation, DEFAULT_MIN_LENGTH};
use super::patterns::PatternRegistry;
use super::segment::{DictionarySegmenter, Segmenter};
use super::vocabulary::{Vocabulary, VocabularyFormat, VocabularySource};

/// 单条文本的审核结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// 是否合规，等价于 `reasons.is_empty()`
    pub is_appropriate: bool,
    /// 违规原因，按 敏感词 → 规则 → 长度 顺序
    pub reasons: Vec<String>,
}

impl Verdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
        Self {
            is_appropriate: reasons.is_empty(),
            reasons,
        }
    }

    /// 无效输入
    pub fn invalid_input() -> Self {
        Self::from_violations(vec![Violation::InvalidInput])
    }

    /// 审核过程出错
    pub fn error(description: impl Into<String>) -> Self {
        Self::from_violations(vec![Violation::ScreeningError(description.into())])
    }
}

/// 批量审核结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchVerdict {
    /// 与输入一一对应
    pub results: Vec<Verdict>,
    /// 输入总数
    pub total: usize,
    /// 不合规数量
    pub inappropriate_count: usize,
}

impl BatchVerdict {
    pub fn from_results(results: Vec<Verdict>) -> Self {
        let inappropriate_count = results.iter().filter(|v| !v.is_appropriate).count();
        Self {
            total: results.len(),
            inappropriate_count,
            results,
        }
    }
}

/// 引擎状态 (健康检查用)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    /// 敏感词数量
    pub vocabulary_size: usize,
    /// 规则数量
    pub pattern_count: usize,
    /// 分词缓存状态
    pub cache: CacheStats,
}

/// 引擎构建参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// 最小内容长度 (字符数)
    pub min_length: usize,
    /// 分词缓存容量，0 表示不限
    pub cache_capacity: usize,
    /// 敏感词库文件，缺省时使用内置词库
    pub vocabulary_path: Option<PathBuf>,
    /// 规则配置目录，缺省时只启用内置规则
    pub rules_dir: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            cache_capacity: TokenCache::DEFAULT_CAPACITY,
            vocabulary_path: None,
            rules_dir: None,
        }
    }
}

/// 内容审核引擎
pub struct ScreeningEngine {
    cache: Arc<TokenCache>,
    vocabulary: Arc<Vocabulary>,
    patterns: PatternRegistry,
    min_length: usize,
}

impl ScreeningEngine {
    /// 使用已构建的组件创建引擎
    pub fn new(
        vocabulary: impl Into<Arc<Vocabulary>>,
        patterns: PatternRegistry,
        segmenter: Arc<dyn Segmenter>,
        options: &EngineOptions,
    ) -> Self {
        Self {
            cache: Arc::new(TokenCache::new(segmenter, options.cache_capacity)),
            vocabulary: vocabulary.into(),
            patterns,
            min_length: options.min_length,
        }
    }

    /// 内置词库 + 内置规则 + 词典分词器
    pub fn with_defaults() -> Self {
        Self::from_options(&EngineOptions::default())
    }

    /// 按配置加载词库和规则
    ///
    /// 分词器为与引擎共享词库的 [`DictionarySegmenter`]，
    /// 运行时增删或重新加载的词条立即参与分词。
    pub fn from_options(options: &EngineOptions) -> Self {
        let (vocabulary, _) = Vocabulary::from_source(options.vocabulary_path.as_deref());
        let vocabulary = Arc::new(vocabulary);
        let segmenter = DictionarySegmenter::shared(Arc::clone(&vocabulary));
        Self::from_options_with_segmenter(options, vocabulary, Arc::new(segmenter))
    }

    /// 按配置加载规则，使用指定的词库和分词器
    pub fn from_options_with_segmenter(
        options: &EngineOptions,
        vocabulary: impl Into<Arc<Vocabulary>>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Self {
        let patterns = match options.rules_dir.as_deref() {
            Some(dir) => match RulesConfig::load(dir) {
                Ok(config) => config.build_registry(),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "failed to load rules config, using builtin rules");
                    PatternRegistry::with_defaults()
                }
            },
            None => PatternRegistry::with_defaults(),
        };

        let engine = Self::new(vocabulary, patterns, segmenter, options);
        tracing::info!(
            vocabulary_size = engine.vocabulary_size(),
            pattern_count = engine.pattern_count(),
            min_length = engine.min_length,
            "screening engine initialized"
        );
        engine
    }

    /// 审核单条文本
    ///
    /// 空串或纯空白直接判为无效输入，不进行分词。
    pub fn screen(&self, text: &str) -> Verdict {
        if text.trim().is_empty() {
            return Verdict::invalid_input();
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.collect_violations(text))) {
            Ok(Ok(violations)) => Verdict::from_violations(violations),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "screening failed");
                Verdict::error(e.to_string())
            }
            Err(payload) => {
                let description = panic_message(payload.as_ref());
                tracing::error!(error = %description, "screening panicked");
                Verdict::error(description)
            }
        }
    }

    /// 审核非类型化输入，非字符串一律判为无效输入
    pub fn screen_value(&self, value: &Value) -> Verdict {
        match value.as_str() {
            Some(text) => self.screen(text),
            None => Verdict::invalid_input(),
        }
    }

    /// 批量审核
    ///
    /// 各条目并行、相互隔离，结果顺序与输入一致。
    pub fn screen_batch<S>(&self, texts: &[S]) -> BatchVerdict
    where
        S: AsRef<str> + Sync,
    {
        let results = texts.par_iter().map(|t| self.screen(t.as_ref())).collect();
        BatchVerdict::from_results(results)
    }

    /// 批量审核非类型化输入
    pub fn screen_batch_values(&self, values: &[Value]) -> BatchVerdict {
        let results = values.par_iter().map(|v| self.screen_value(v)).collect();
        BatchVerdict::from_results(results)
    }

    fn collect_violations(&self, text: &str) -> Result<Vec<Violation>, ScreeningError> {
        let tokens = self.cache.tokenize(text)?;
        let mut violations = self.vocabulary.with_words(|words| scan_words(&tokens[..], words))?;

        let rules = self.patterns.snapshot()?;
        violations.extend(scan_patterns(text, &rules));

        violations.extend(check_length(text, self.min_length));
        Ok(violations)
    }

    /// 添加敏感词，返回实际新增数量
    pub fn add_sensitive_words<S: AsRef<str>>(&self, words: &[S]) -> usize {
        match self.vocabulary.add(words) {
            Ok(added) => {
                tracing::info!(requested = words.len(), added, "sensitive words added");
                if added > 0 {
                    self.clear_cache();
                }
                added
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to add sensitive words");
                0
            }
        }
    }

    /// 删除敏感词，返回实际删除数量
    pub fn remove_sensitive_words<S: AsRef<str>>(&self, words: &[S]) -> usize {
        match self.vocabulary.remove(words) {
            Ok(removed) => {
                tracing::info!(requested = words.len(), removed, "sensitive words removed");
                if removed > 0 {
                    self.clear_cache();
                }
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to remove sensitive words");
                0
            }
        }
    }

    /// 保存词库
    pub fn save_vocabulary(&self, path: &Path, format: VocabularyFormat) -> bool {
        match self.vocabulary.save(path, format) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to save vocabulary");
                false
            }
        }
    }

    /// 重新加载词库，失败时回退到内置词库
    pub fn load_vocabulary(&self, path: Option<&Path>) -> VocabularySource {
        let source = self.vocabulary.load(path);
        self.clear_cache();
        source
    }

    /// 添加规则，模式无效或名称重复时返回 false 且注册表不变
    pub fn add_pattern_rule(&self, name: &str, pattern: &str) -> bool {
        match self.patterns.add_rule(name, pattern) {
            Ok(()) => {
                tracing::info!(name, pattern, "pattern rule added");
                true
            }
            Err(e) => {
                tracing::warn!(name, pattern, error = %e, "pattern rule rejected");
                false
            }
        }
    }

    /// 删除规则
    pub fn remove_pattern_rule(&self, name: &str) -> bool {
        match self.patterns.remove_rule(name) {
            Ok(removed) => {
                tracing::info!(name, removed, "pattern rule remove requested");
                removed
            }
            Err(e) => {
                tracing::error!(name, error = %e, "failed to remove pattern rule");
                false
            }
        }
    }

    /// 持久化当前规则状态
    pub fn save_rules(&self, config_dir: &Path) -> bool {
        let result = RulesConfig::from_registry(&self.patterns).and_then(|config| config.save(config_dir));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(dir = %config_dir.display(), error = %e, "failed to save rules");
                false
            }
        }
    }

    /// 清空分词缓存
    pub fn clear_cache(&self) {
        if let Err(e) = self.cache.clear() {
            tracing::error!(error = %e, "failed to clear token cache");
        }
    }

    /// 共享的分词缓存
    pub fn token_cache(&self) -> Arc<TokenCache> {
        Arc::clone(&self.cache)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            vocabulary_size: self.vocabulary_size(),
            pattern_count: self.pattern_count(),
            cache: self.cache.stats(),
        }
    }
}

impl Default for ScreeningEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
