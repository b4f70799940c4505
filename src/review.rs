//! 评论分析
//!
//! 将情感分析与内容审核合并为一条评论的分析结果。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::screening::{EngineStats, ScreeningEngine};
use crate::sentiment::{Sentiment, SentimentAnalyzer, SentimentClassifier};
use crate::text;

/// 评论分析请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub review_id: i64,
    pub content: String,
}

/// 评论分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    pub review_id: i64,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub is_appropriate: bool,
    #[serde(default)]
    pub inappropriate_reasons: Vec<String>,
}

/// 健康状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub engine: EngineStats,
    pub sentiment_threshold: f64,
}

/// 评论分析器
pub struct ReviewAnalyzer {
    engine: Arc<ScreeningEngine>,
    sentiment: SentimentAnalyzer,
}

impl ReviewAnalyzer {
    /// 情感分析与审核引擎共享同一份分词缓存
    pub fn new(engine: Arc<ScreeningEngine>, classifier: Arc<dyn SentimentClassifier>, threshold: f64) -> Self {
        let sentiment = SentimentAnalyzer::new(classifier, engine.token_cache(), threshold);
        Self { engine, sentiment }
    }

    pub fn engine(&self) -> &ScreeningEngine {
        &self.engine
    }

    pub fn sentiment(&self) -> &SentimentAnalyzer {
        &self.sentiment
    }

    /// 分析单条评论
    ///
    /// 情感分析使用清洗后的文本，审核使用原文。
    pub fn analyze(&self, request: &ReviewRequest) -> ReviewAnalysis {
        let score = self.sentiment.analyze(&text::clean(&request.content));
        let verdict = self.engine.screen(&request.content);

        tracing::debug!(
            review_id = request.review_id,
            sentiment = score.sentiment.as_str(),
            is_appropriate = verdict.is_appropriate,
            "review analyzed"
        );

        ReviewAnalysis {
            review_id: request.review_id,
            sentiment: score.sentiment,
            sentiment_score: score.score,
            is_appropriate: verdict.is_appropriate,
            inappropriate_reasons: verdict.reasons,
        }
    }

    /// 批量分析，结果与输入顺序一致
    pub fn analyze_batch(&self, requests: &[ReviewRequest]) -> Vec<ReviewAnalysis> {
        let cleaned: Vec<String> = requests.iter().map(|r| text::clean(&r.content)).collect();
        let scores = self.sentiment.analyze_batch(&cleaned);

        let contents: Vec<&str> = requests.iter().map(|r| r.content.as_str()).collect();
        let batch = self.engine.screen_batch(&contents);

        requests
            .iter()
            .zip(scores)
            .zip(batch.results)
            .map(|((request, score), verdict)| ReviewAnalysis {
                review_id: request.review_id,
                sentiment: score.sentiment,
                sentiment_score: score.score,
                is_appropriate: verdict.is_appropriate,
                inappropriate_reasons: verdict.reasons,
            })
            .collect()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            engine: self.engine.stats(),
            sentiment_threshold: self.sentiment.threshold(),
        }
    }
}
