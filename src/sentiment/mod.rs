//! 情感分析
//!
//! 分类模型是外部组件，只通过 [`SentimentClassifier`] 接入。
//! 本模块负责输入校验、分词预处理 (与审核引擎共享缓存) 和阈值映射。

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::screening::{panic_message, ScreeningError, TokenCache};

/// 默认判定阈值
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// 外部情感分类器
pub trait SentimentClassifier: Send + Sync {
    /// 返回 (原始标签, 置信度 0.0..=1.0)
    fn classify(&self, text: &str) -> Result<(String, f64), ScreeningError>;

    /// 批量分类，结果与输入一一对应
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<(String, f64)>, ScreeningError> {
        texts.iter().map(|t| self.classify(t)).collect()
    }
}

/// 情感倾向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// 情感分析结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub sentiment: Sentiment,
    pub score: f64,
}

impl SentimentScore {
    /// 无法判断时的结果
    pub fn neutral() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            score: 0.0,
        }
    }

    /// 将分类器原始输出映射为情感倾向
    ///
    /// 标签包含 positive/negative (不区分大小写) 且置信度严格大于阈值时
    /// 判为对应倾向，否则为中性并保留置信度。
    pub fn from_raw(label: &str, score: f64, threshold: f64) -> Self {
        let label = label.to_lowercase();
        let sentiment = if label.contains("positive") && score > threshold {
            Sentiment::Positive
        } else if label.contains("negative") && score > threshold {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };
        Self { sentiment, score }
    }
}

/// 情感分析器
pub struct SentimentAnalyzer {
    classifier: Arc<dyn SentimentClassifier>,
    cache: Arc<TokenCache>,
    threshold: AtomicU64,
}

impl SentimentAnalyzer {
    /// # Arguments
    /// * `classifier` - 外部分类器
    /// * `cache` - 分词缓存，通常与审核引擎共享
    /// * `threshold` - 判定阈值，超出 0.0..=1.0 时使用默认值
    pub fn new(classifier: Arc<dyn SentimentClassifier>, cache: Arc<TokenCache>, threshold: f64) -> Self {
        let threshold = if is_valid_threshold(threshold) {
            threshold
        } else {
            tracing::warn!(threshold, "invalid sentiment threshold, using default");
            DEFAULT_THRESHOLD
        };

        Self {
            classifier,
            cache,
            threshold: AtomicU64::new(threshold.to_bits()),
        }
    }

    pub fn threshold(&self) -> f64 {
        f64::from_bits(self.threshold.load(Ordering::Relaxed))
    }

    /// 设置判定阈值，超出 0.0..=1.0 时拒绝并返回 false
    pub fn set_threshold(&self, threshold: f64) -> bool {
        if !is_valid_threshold(threshold) {
            tracing::warn!(threshold, "invalid sentiment threshold, expected 0.0..=1.0");
            return false;
        }
        self.threshold.store(threshold.to_bits(), Ordering::Relaxed);
        true
    }

    /// 分析单条文本
    ///
    /// 空白输入、分类失败和分类器 panic 都返回中性 0.0。
    pub fn analyze(&self, text: &str) -> SentimentScore {
        if text.trim().is_empty() {
            tracing::warn!("invalid sentiment input");
            return SentimentScore::neutral();
        }

        let result = isolate(|| {
            let processed = self.preprocess(text)?;
            validate_output(self.classifier.classify(&processed)?)
        });

        match result {
            Ok((label, score)) => {
                tracing::debug!(%label, score, "classifier output");
                SentimentScore::from_raw(&label, score, self.threshold())
            }
            Err(e) => {
                tracing::error!(error = %e, "sentiment analysis failed");
                SentimentScore::neutral()
            }
        }
    }

    /// 批量分析，结果与输入一一对应
    ///
    /// 有效文本一次性交给分类器；分类失败时这些文本全部为中性 0.0。
    pub fn analyze_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SentimentScore> {
        let mut results = vec![SentimentScore::neutral(); texts.len()];

        let mut positions = Vec::new();
        let mut processed = Vec::new();
        for (idx, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            if text.trim().is_empty() {
                continue;
            }
            match isolate(|| self.preprocess(text)) {
                Ok(p) => {
                    positions.push(idx);
                    processed.push(p);
                }
                Err(e) => tracing::error!(index = idx, error = %e, "sentiment preprocessing failed"),
            }
        }

        if processed.is_empty() {
            return results;
        }

        let outputs = isolate(|| self.classifier.classify_batch(&processed)).and_then(|outputs| {
            if outputs.len() != processed.len() {
                return Err(ScreeningError::Classification(format!(
                    "expected {} results, got {}",
                    processed.len(),
                    outputs.len()
                )));
            }
            outputs.into_iter().map(validate_output).collect::<Result<Vec<_>, _>>()
        });

        match outputs {
            Ok(outputs) => {
                let threshold = self.threshold();
                for (idx, (label, score)) in positions.into_iter().zip(outputs) {
                    results[idx] = SentimentScore::from_raw(&label, score, threshold);
                }
            }
            Err(e) => tracing::error!(count = processed.len(), error = %e, "batch sentiment analysis failed"),
        }

        results
    }

    /// 清空分词缓存
    pub fn clear_cache(&self) {
        if let Err(e) = self.cache.clear() {
            tracing::error!(error = %e, "failed to clear token cache");
        }
    }

    /// 分词后以空格拼接
    fn preprocess(&self, text: &str) -> Result<String, ScreeningError> {
        Ok(self.cache.tokenize(text)?.join(" "))
    }
}

/// 捕获分类过程中的 panic，转为分类错误
fn isolate<T>(f: impl FnOnce() -> Result<T, ScreeningError>) -> Result<T, ScreeningError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ScreeningError::Classification(format!(
            "classifier panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn is_valid_threshold(threshold: f64) -> bool {
    (0.0..=1.0).contains(&threshold)
}

fn validate_output((label, score): (String, f64)) -> Result<(String, f64), ScreeningError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(ScreeningError::Classification(format!(
            "confidence out of range: {}",
            score
        )));
    }
    Ok((label, score))
}
