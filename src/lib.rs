// Review Guard Library
// Content screening and sentiment analysis for user reviews

pub mod config;
pub mod error;
pub mod logging;
pub mod review;
pub mod screening;
pub mod sentiment;
pub mod storage;
pub mod text;

pub use config::ServiceConfig;
pub use error::{AppError, ErrorResponse};
pub use review::{HealthStatus, ReviewAnalysis, ReviewAnalyzer, ReviewRequest};
pub use screening::{
    BatchVerdict, EngineOptions, EngineStats, PatternRegistry, ScreeningEngine, ScreeningError, Segmenter,
    Verdict, Vocabulary,
};
pub use sentiment::{Sentiment, SentimentAnalyzer, SentimentClassifier, SentimentScore};
