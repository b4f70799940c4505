//! 结构化规则定义与规则注册表
//!
//! 内置手机号、身份证号、URL、邮箱、银行卡号规则，支持运行时增删自定义规则。
//! 规则按插入顺序评估和上报。

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::{Match, Regex};
use serde::{Deserialize, Serialize};

use super::error::ScreeningError;

/// 匹配边界模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// 不做额外边界检查
    #[default]
    None,
    /// 匹配两侧不得紧邻 ASCII 数字
    Digits,
}

/// 规则定义 (未编译)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 规则名称，出现在违规原因中
    pub name: String,
    /// 正则表达式模式
    pub pattern: String,
    /// 边界模式
    #[serde(default)]
    pub boundary: Boundary,
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, boundary: Boundary) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            boundary,
        }
    }

    /// 创建自定义规则
    pub fn custom(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, pattern, Boundary::None)
    }

    /// 校验并编译
    pub fn compile(&self) -> Result<PatternRule, ScreeningError> {
        validate_rule_name(&self.name)?;
        validate_regex_pattern(&self.pattern)?;

        Ok(PatternRule {
            name: self.name.clone(),
            source: self.pattern.clone(),
            boundary: self.boundary,
            regex: Regex::new(&self.pattern)?,
        })
    }
}

/// 内置规则集
pub static BUILTIN_RULES: Lazy<Vec<RuleDefinition>> = Lazy::new(|| {
    vec![
        // 大陆手机号: 1[3-9] 开头的 11 位数字
        // 数字类规则只接受 ASCII 数字，与边界检查一致 (`\d` 会匹配全角数字)
        RuleDefinition::new("phone_number", r"1[3-9][0-9]{9}", Boundary::Digits),
        // 18 位身份证号: 地区码 + 出生日期 + 顺序码 + 校验位
        RuleDefinition::new(
            "id_card",
            r"[1-9][0-9]{5}(?:18|19|20)[0-9]{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12][0-9]|3[01])[0-9]{3}[0-9Xx]",
            Boundary::Digits,
        ),
        RuleDefinition::new(
            "url",
            r"(?:https?://|www\.)[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+",
            Boundary::None,
        ),
        RuleDefinition::new(
            "email",
            r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}",
            Boundary::None,
        ),
        // Visa / MasterCard / 银联
        RuleDefinition::new(
            "bank_card",
            r"(?:4[0-9]{15}|5[1-5][0-9]{14}|62[0-9]{14,17})",
            Boundary::Digits,
        ),
    ]
});

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: String,
    source: String,
    boundary: Boundary,
    regex: Regex,
}

impl PatternRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// 从左到右查找所有不重叠的匹配
    ///
    /// `Boundary::Digits` 下，紧邻数字的候选会被跳过，
    /// 并从候选起点的下一个字符继续搜索。
    pub fn find_all<'t>(&self, text: &'t str) -> Vec<Match<'t>> {
        if self.boundary == Boundary::None {
            return self.regex.find_iter(text).collect();
        }

        let mut matches = Vec::new();
        let mut pos = 0;
        while pos <= text.len() {
            let Some(m) = self.regex.find_at(text, pos) else {
                break;
            };

            if is_digit_bounded(text, m.start(), m.end()) {
                pos = if m.end() > m.start() { m.end() } else { next_char_boundary(text, m.end()) };
                matches.push(m);
            } else {
                pos = next_char_boundary(text, m.start());
            }
        }
        matches
    }
}

fn is_digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map(|c| pos + c.len_utf8())
        .unwrap_or(text.len() + 1)
}

/// 校验规则名称
pub fn validate_rule_name(name: &str) -> Result<(), ScreeningError> {
    if name.trim().is_empty() {
        return Err(ScreeningError::validation("Rule name cannot be empty"));
    }
    Ok(())
}

/// 校验正则表达式是否有效
pub fn validate_regex_pattern(pattern: &str) -> Result<(), ScreeningError> {
    if pattern.trim().is_empty() {
        return Err(ScreeningError::validation("Regex pattern cannot be empty"));
    }
    Regex::new(pattern)?;
    Ok(())
}

/// 规则快照 (不可变，可跨线程共享)
pub type RuleSnapshot = Arc<Vec<PatternRule>>;

/// 规则注册表
///
/// 写操作复制整份规则列表后替换，读方拿到的快照在扫描期间保持不变。
#[derive(Debug)]
pub struct PatternRegistry {
    rules: RwLock<RuleSnapshot>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternRegistry {
    /// 使用已编译规则创建注册表 (同名规则保留第一条)
    pub fn new(rules: Vec<PatternRule>) -> Self {
        let mut unique: Vec<PatternRule> = Vec::with_capacity(rules.len());
        for rule in rules {
            if unique.iter().any(|r| r.name == rule.name) {
                tracing::warn!(name = %rule.name, "duplicate pattern rule ignored");
                continue;
            }
            unique.push(rule);
        }

        Self {
            rules: RwLock::new(Arc::new(unique)),
        }
    }

    /// 使用内置规则创建注册表
    pub fn with_defaults() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|def| match def.compile() {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::error!(name = %def.name, error = %e, "builtin rule failed to compile");
                    None
                }
            })
            .collect();
        Self::new(rules)
    }

    /// 添加规则
    ///
    /// 名称为空、模式无效或名称重复时拒绝，注册表保持不变。
    pub fn add_rule(&self, name: &str, pattern: &str) -> Result<(), ScreeningError> {
        self.add_definition(&RuleDefinition::custom(name, pattern))
    }

    /// 添加规则定义 (可指定边界模式)
    pub fn add_definition(&self, definition: &RuleDefinition) -> Result<(), ScreeningError> {
        let rule = definition.compile()?;

        let mut guard = self
            .rules
            .write()
            .map_err(|_| ScreeningError::LockPoisoned("pattern registry"))?;

        if guard.iter().any(|r| r.name == rule.name) {
            return Err(ScreeningError::Validation(format!(
                "Pattern rule '{}' already exists",
                rule.name
            )));
        }

        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(rule);
        *guard = Arc::new(next);
        Ok(())
    }

    /// 删除规则，规则存在时返回 true
    pub fn remove_rule(&self, name: &str) -> Result<bool, ScreeningError> {
        let mut guard = self
            .rules
            .write()
            .map_err(|_| ScreeningError::LockPoisoned("pattern registry"))?;

        if !guard.iter().any(|r| r.name == name) {
            return Ok(false);
        }

        let next: Vec<PatternRule> = guard.iter().filter(|r| r.name != name).cloned().collect();
        *guard = Arc::new(next);
        Ok(true)
    }

    /// 当前规则快照
    pub fn snapshot(&self) -> Result<RuleSnapshot, ScreeningError> {
        self.rules
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| ScreeningError::LockPoisoned("pattern registry"))
    }

    /// 按评估顺序返回规则名称
    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .map(|rules| rules.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|rules| rules.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod pattern_tests {
    use super::*;

    fn builtin(name: &str) -> PatternRule {
        BUILTIN_RULES
            .iter()
            .find(|r| r.name == name)
            .unwrap()
            .compile()
            .unwrap()
    }

    fn found<'t>(rule: &PatternRule, text: &'t str) -> Vec<&'t str> {
        rule.find_all(text).iter().map(|m| m.as_str()).collect()
    }

    #[test]
    fn test_all_builtin_patterns_compile() {
        for rule in BUILTIN_RULES.iter() {
            let result = rule.compile();
            assert!(result.is_ok(), "Pattern '{}' failed to compile: {:?}", rule.name, result.err());
        }
    }

    #[test]
    fn test_builtin_order() {
        let registry = PatternRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["phone_number", "id_card", "url", "email", "bank_card"]
        );
    }

    #[test]
    fn test_phone_number_pattern() {
        let rule = builtin("phone_number");
        assert_eq!(found(&rule, "手机号: 13812345678"), vec!["13812345678"]);
        assert_eq!(found(&rule, "联系13812345678或15900001111"), vec!["13812345678", "15900001111"]);
        assert!(found(&rule, "12812345678").is_empty());
    }

    #[test]
    fn test_phone_number_inside_longer_digit_run_rejected() {
        let rule = builtin("phone_number");
        assert!(found(&rule, "订单号 913812345678").is_empty());
        assert!(found(&rule, "订单号 138123456789").is_empty());
        assert!(found(&rule, "0013812345678000").is_empty());
    }

    #[test]
    fn test_phone_number_adjacent_to_letters_matches() {
        let rule = builtin("phone_number");
        assert_eq!(found(&rule, "tel13812345678x"), vec!["13812345678"]);
    }

    #[test]
    fn test_id_card_pattern() {
        let rule = builtin("id_card");
        assert_eq!(found(&rule, "身份证: 110101199003076789"), vec!["110101199003076789"]);
        assert_eq!(found(&rule, "身份证11010119900307678X号"), vec!["11010119900307678X"]);
        assert!(found(&rule, "1101011990030767891").is_empty());
    }

    #[test]
    fn test_url_pattern() {
        let rule = builtin("url");
        assert_eq!(
            found(&rule, "看这里https://example.com/a?b=1很好"),
            vec!["https://example.com/a?b=1"]
        );
        assert_eq!(found(&rule, "访问 www.example.com 吧"), vec!["www.example.com"]);
    }

    #[test]
    fn test_email_pattern() {
        let rule = builtin("email");
        assert_eq!(found(&rule, "邮箱user.name@example.com谢谢"), vec!["user.name@example.com"]);
        assert!(found(&rule, "user@localhost").is_empty());
    }

    #[test]
    fn test_bank_card_pattern() {
        let rule = builtin("bank_card");
        assert_eq!(found(&rule, "卡号6222021234567890123"), vec!["6222021234567890123"]);
        assert_eq!(found(&rule, "visa 4111111111111111"), vec!["4111111111111111"]);
        assert!(found(&rule, "41111111111111112222").is_empty());
    }

    #[test]
    fn test_add_rule_appends_in_order() {
        let registry = PatternRegistry::with_defaults();
        registry.add_rule("qq", r"[Qq]{2}\d{5,}").unwrap();
        registry.add_rule("wechat", r"(?i)wx_\w+").unwrap();

        let names = registry.names();
        assert_eq!(&names[names.len() - 2..], &["qq".to_string(), "wechat".to_string()]);
    }

    #[test]
    fn test_add_malformed_rule_rejected() {
        let registry = PatternRegistry::with_defaults();
        let before = registry.len();

        let result = registry.add_rule("bad", "(unclosed");

        assert!(matches!(result, Err(ScreeningError::InvalidPattern(_))));
        assert_eq!(registry.len(), before);
        assert!(!registry.names().contains(&"bad".to_string()));
    }

    #[test]
    fn test_add_rule_validation() {
        let registry = PatternRegistry::with_defaults();
        assert!(registry.add_rule("  ", r"\d+").is_err());
        assert!(registry.add_rule("empty", "   ").is_err());
        assert!(registry.add_rule("phone_number", r"\d+").is_err());
        assert_eq!(registry.len(), BUILTIN_RULES.len());
    }

    #[test]
    fn test_remove_rule() {
        let registry = PatternRegistry::with_defaults();
        assert!(registry.remove_rule("email").unwrap());
        assert!(!registry.remove_rule("email").unwrap());
        assert!(!registry.remove_rule("missing").unwrap());
        assert_eq!(registry.len(), BUILTIN_RULES.len() - 1);
    }

    #[test]
    fn test_readd_moves_rule_to_end() {
        let registry = PatternRegistry::with_defaults();
        registry.remove_rule("phone_number").unwrap();
        registry.add_rule("phone_number", r"1[3-9]\d{9}").unwrap();

        assert_eq!(registry.names().last().map(String::as_str), Some("phone_number"));
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let registry = PatternRegistry::with_defaults();
        let snapshot = registry.snapshot().unwrap();

        registry.add_rule("later", "later").unwrap();
        registry.remove_rule("url").unwrap();

        assert_eq!(snapshot.len(), BUILTIN_RULES.len());
        assert!(snapshot.iter().any(|r| r.name() == "url"));
    }

    #[test]
    fn test_new_ignores_duplicate_names() {
        let a = RuleDefinition::custom("dup", "a").compile().unwrap();
        let b = RuleDefinition::custom("dup", "b").compile().unwrap();
        let registry = PatternRegistry::new(vec![a, b]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().unwrap()[0].source(), "a");
    }

    #[test]
    fn test_validate_regex_pattern() {
        assert!(validate_regex_pattern(r"\btest\b").is_ok());
        assert!(validate_regex_pattern(r"[unclosed").is_err());
        assert!(validate_regex_pattern(r"(?P<dup>a)(?P<dup>b)").is_err());
        assert!(validate_regex_pattern("").is_err());
    }

    #[test]
    fn test_digit_rules_ignore_fullwidth_digits() {
        assert!(found(&builtin("phone_number"), "号码 138１２３４５６７８ 谢谢").is_empty());
        assert!(found(&builtin("id_card"), "１１０１０１１９９００３０７６７８９").is_empty());
        assert!(found(&builtin("bank_card"), "卡号 62２２０２１２３４５６７８９０１２").is_empty());
    }

    #[test]
    fn test_fullwidth_digit_does_not_block_ascii_match() {
        // 全角数字不算边界上的数字
        assert_eq!(found(&builtin("phone_number"), "１13812345678"), vec!["13812345678"]);
    }
}
