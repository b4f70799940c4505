//! 服务配置
//!
//! 配置来源优先级: 环境变量 > JSON 配置文件 > 默认值。

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::screening::{EngineOptions, TokenCache, DEFAULT_MIN_LENGTH};
use crate::sentiment::DEFAULT_THRESHOLD;

/// 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// 情感分类模型目录
    pub model_path: PathBuf,
    pub log_level: String,
    /// 敏感词库文件，缺省时使用内置词库
    pub vocabulary_path: Option<PathBuf>,
    /// 规则配置目录
    pub rules_dir: Option<PathBuf>,
    pub min_content_length: usize,
    /// 分词缓存容量，0 表示不限
    pub token_cache_capacity: usize,
    pub sentiment_threshold: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from("models"),
            log_level: "INFO".to_string(),
            vocabulary_path: None,
            rules_dir: None,
            min_content_length: DEFAULT_MIN_LENGTH,
            token_cache_capacity: TokenCache::DEFAULT_CAPACITY,
            sentiment_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ServiceConfig {
    /// 只从环境变量读取
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，便于测试
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup);
        config
    }

    /// 读取配置文件 (可选)，再叠加环境变量并校验
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content).map_err(|e| {
                    AppError::config(format!("invalid config file {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), AppError> {
        if self.host.trim().is_empty() {
            return Err(AppError::config("SERVICE_HOST must not be empty"));
        }
        if self.port == 0 {
            return Err(AppError::config("SERVICE_PORT must not be 0"));
        }
        if !(0.0..=1.0).contains(&self.sentiment_threshold) {
            return Err(AppError::config(format!(
                "SENTIMENT_THRESHOLD must be within 0.0..=1.0, got {}",
                self.sentiment_threshold
            )));
        }
        Ok(())
    }

    /// 审核引擎构建参数
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            min_length: self.min_content_length,
            cache_capacity: self.token_cache_capacity,
            vocabulary_path: self.vocabulary_path.clone(),
            rules_dir: self.rules_dir.clone(),
        }
    }

    /// `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("SERVICE_HOST") {
            self.host = host;
        }
        if let Some(value) = get("SERVICE_PORT") {
            self.port = parse_or_keep("SERVICE_PORT", &value, self.port);
        }
        if let Some(path) = get("MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(path) = get("VOCABULARY_PATH") {
            self.vocabulary_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("RULES_DIR") {
            self.rules_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = get("MIN_CONTENT_LENGTH") {
            self.min_content_length = parse_or_keep("MIN_CONTENT_LENGTH", &value, self.min_content_length);
        }
        if let Some(value) = get("TOKEN_CACHE_CAPACITY") {
            self.token_cache_capacity = parse_or_keep("TOKEN_CACHE_CAPACITY", &value, self.token_cache_capacity);
        }
        if let Some(value) = get("SENTIMENT_THRESHOLD") {
            self.sentiment_threshold = parse_or_keep("SENTIMENT_THRESHOLD", &value, self.sentiment_threshold);
        }
    }
}

fn parse_or_keep<T>(key: &str, value: &str, current: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(key, value, fallback = %current, "invalid config value, keeping previous");
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(|_| None);

        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.model_path, PathBuf::from("models"));
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.min_content_length, 5);
        assert_eq!(config.token_cache_capacity, 10_000);
        assert_eq!(config.sentiment_threshold, 0.8);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SERVICE_HOST", "127.0.0.1"),
            ("SERVICE_PORT", "9000"),
            ("MODEL_PATH", "/opt/models"),
            ("LOG_LEVEL", "DEBUG"),
            ("VOCABULARY_PATH", "/etc/words.txt"),
            ("RULES_DIR", "/etc/guard"),
            ("MIN_CONTENT_LENGTH", "3"),
            ("TOKEN_CACHE_CAPACITY", "0"),
            ("SENTIMENT_THRESHOLD", "0.65"),
        ]));

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.model_path, PathBuf::from("/opt/models"));
        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.vocabulary_path, Some(PathBuf::from("/etc/words.txt")));
        assert_eq!(config.min_content_length, 3);
        assert_eq!(config.token_cache_capacity, 0);
        assert_eq!(config.sentiment_threshold, 0.65);

        let options = config.engine_options();
        assert_eq!(options.min_length, 3);
        assert_eq!(options.cache_capacity, 0);
        assert_eq!(options.rules_dir, Some(PathBuf::from("/etc/guard")));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SERVICE_PORT", "eighty"),
            ("MIN_CONTENT_LENGTH", "-1"),
            ("SENTIMENT_THRESHOLD", "high"),
            ("SERVICE_HOST", "   "),
        ]));

        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_load_file_then_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        std::fs::write(&path, r#"{"port": 7000, "log_level": "warn", "min_content_length": 10}"#).unwrap();

        let config = ServiceConfig::load_with(Some(&path), lookup(&[("LOG_LEVEL", "error")])).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.min_content_length, 10);
        assert_eq!(config.log_level, "error");
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ServiceConfig::load_with(Some(&missing), |_| None),
            Err(AppError::Io(_))
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            ServiceConfig::load_with(Some(&broken), |_| None),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(ServiceConfig::default().validate().is_ok());

        let config = ServiceConfig::from_lookup(lookup(&[("SENTIMENT_THRESHOLD", "1.5")]));
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = ServiceConfig::from_lookup(lookup(&[("SERVICE_PORT", "0")]));
        assert!(config.validate().is_err());

        assert!(ServiceConfig::load_with(None, lookup(&[("SENTIMENT_THRESHOLD", "-0.2")])).is_err());
    }
}
