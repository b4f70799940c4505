//! 审核规则配置
//!
//! 持久化内置规则的启用状态和用户自定义规则。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ScreeningError;
use super::patterns::{
    validate_regex_pattern, validate_rule_name, PatternRegistry, PatternRule, RuleDefinition,
    BUILTIN_RULES,
};
use crate::storage::atomic::atomic_write_str;

/// 配置文件名
pub const RULES_FILENAME: &str = "screening-rules.json";

/// 审核规则配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RulesConfig {
    /// 内置规则启用状态 (rule name -> enabled)，缺失的规则默认启用
    #[serde(default)]
    pub builtin_enabled: HashMap<String, bool>,
    /// 用户自定义规则，按添加顺序
    #[serde(default)]
    pub custom_rules: Vec<RuleDefinition>,
}

impl RulesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置目录加载，文件不存在时返回默认配置
    pub fn load(config_dir: &Path) -> Result<Self, ScreeningError> {
        let config_path = config_dir.join(RULES_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ScreeningError::Config(format!("Failed to read rules file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| ScreeningError::Config(format!("Failed to parse rules file: {}", e)))
    }

    /// 保存到配置目录
    pub fn save(&self, config_dir: &Path) -> Result<(), ScreeningError> {
        let content = serde_json::to_string_pretty(self)?;
        atomic_write_str(&config_dir.join(RULES_FILENAME), &content)
            .map_err(|e| ScreeningError::Config(format!("Failed to write rules file: {}", e)))?;
        Ok(())
    }

    /// 从当前注册表状态生成配置
    ///
    /// 不在注册表中的内置规则记为禁用；非内置名称的规则记为自定义规则。
    pub fn from_registry(registry: &PatternRegistry) -> Result<Self, ScreeningError> {
        let snapshot = registry.snapshot()?;
        let mut config = Self::new();

        for builtin in BUILTIN_RULES.iter() {
            let enabled = snapshot.iter().any(|r| r.name() == builtin.name);
            config.builtin_enabled.insert(builtin.name.clone(), enabled);
        }

        config.custom_rules = snapshot
            .iter()
            .filter(|r| !is_builtin_name(r.name()))
            .map(|r| RuleDefinition::new(r.name(), r.source(), r.boundary()))
            .collect();

        Ok(config)
    }

    /// 构建规则注册表：启用的内置规则在前，自定义规则在后
    ///
    /// 无法编译的自定义规则会被跳过并记录警告。
    pub fn build_registry(&self) -> PatternRegistry {
        let mut rules: Vec<PatternRule> = Vec::new();

        let definitions = BUILTIN_RULES
            .iter()
            .filter(|r| self.builtin_enabled.get(&r.name).copied().unwrap_or(true))
            .chain(self.custom_rules.iter());

        for definition in definitions {
            match definition.compile() {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::warn!(name = %definition.name, error = %e, "skipping invalid pattern rule");
                }
            }
        }

        PatternRegistry::new(rules)
    }

    pub fn set_builtin_enabled(&mut self, name: &str, enabled: bool) {
        self.builtin_enabled.insert(name.to_string(), enabled);
    }

    /// 添加自定义规则
    ///
    /// 名称为空、与已有规则 (含内置) 重名或模式无效时返回错误。
    pub fn add_custom_rule(&mut self, rule: RuleDefinition) -> Result<(), ScreeningError> {
        validate_rule_name(&rule.name)?;

        if is_builtin_name(&rule.name) || self.custom_rules.iter().any(|r| r.name == rule.name) {
            return Err(ScreeningError::Validation(format!(
                "Rule '{}' already exists",
                rule.name
            )));
        }

        validate_regex_pattern(&rule.pattern)?;

        self.custom_rules.push(rule);
        Ok(())
    }

    /// 删除自定义规则
    pub fn remove_custom_rule(&mut self, name: &str) -> Result<(), ScreeningError> {
        let original_len = self.custom_rules.len();
        self.custom_rules.retain(|r| r.name != name);

        if self.custom_rules.len() == original_len {
            return Err(ScreeningError::Validation(format!(
                "Custom rule '{}' not found",
                name
            )));
        }

        Ok(())
    }
}

fn is_builtin_name(name: &str) -> bool {
    BUILTIN_RULES.iter().any(|r| r.name == name)
}
