//! 违规检测器
//!
//! 敏感词匹配、规则匹配和长度校验，各自只产出违规原因，不做聚合。

use std::collections::HashSet;
use std::fmt;

use super::patterns::PatternRule;

/// 默认最小内容长度 (字符数)
pub const DEFAULT_MIN_LENGTH: usize = 5;

/// 单条违规
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// 命中敏感词
    BannedWord(String),
    /// 命中结构化规则
    Pattern { rule: String, matched: String },
    /// 内容过短
    TooShort,
    /// 输入无效
    InvalidInput,
    /// 审核过程出错
    ScreeningError(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BannedWord(word) => write!(f, "contains banned word: {}", word),
            Self::Pattern { rule, matched } => write!(f, "contains {}: {}", rule, matched),
            Self::TooShort => f.write_str("content too short"),
            Self::InvalidInput => f.write_str("invalid input"),
            Self::ScreeningError(description) => write!(f, "screening error: {}", description),
        }
    }
}

/// 敏感词匹配
///
/// 按 token 顺序逐个检查，同一敏感词出现多次就上报多次。
pub fn scan_words<S: AsRef<str>>(tokens: &[S], vocabulary: &HashSet<String>) -> Vec<Violation> {
    let mut violations = Vec::new();
    for token in tokens {
        let token: &str = token.as_ref();
        if vocabulary.contains(token) {
            violations.push(Violation::BannedWord(token.to_string()));
        }
    }
    violations
}

/// 规则匹配
///
/// 按规则顺序，每条规则内按匹配位置从左到右上报。
pub fn scan_patterns(text: &str, rules: &[PatternRule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for rule in rules {
        for m in rule.find_all(text) {
            violations.push(Violation::Pattern {
                rule: rule.name().to_string(),
                matched: m.as_str().to_string(),
            });
        }
    }
    violations
}

/// 长度校验，按 Unicode 字符计数
pub fn check_length(text: &str, min_length: usize) -> Option<Violation> {
    (text.chars().count() < min_length).then_some(Violation::TooShort)
}

#[cfg(test)]
mod matcher_tests {
    use super::*;
    use crate::screening::patterns::{RuleDefinition, BUILTIN_RULES};

    fn vocabulary(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn builtin_rules() -> Vec<PatternRule> {
        BUILTIN_RULES.iter().map(|r| r.compile().unwrap()).collect()
    }

    #[test]
    fn test_violation_display() {
        assert_eq!(
            Violation::BannedWord("诈骗".into()).to_string(),
            "contains banned word: 诈骗"
        );
        assert_eq!(
            Violation::Pattern {
                rule: "email".into(),
                matched: "a@b.cn".into()
            }
            .to_string(),
            "contains email: a@b.cn"
        );
        assert_eq!(Violation::TooShort.to_string(), "content too short");
        assert_eq!(Violation::InvalidInput.to_string(), "invalid input");
        assert_eq!(
            Violation::ScreeningError("boom".into()).to_string(),
            "screening error: boom"
        );
    }

    #[test]
    fn test_scan_words_reports_every_occurrence() {
        let vocab = vocabulary(&["赌博", "诈骗"]);
        let tokens = ["诈骗", "和", "赌博", "还有", "诈骗"];

        let reasons: Vec<String> = scan_words(&tokens, &vocab).iter().map(|v| v.to_string()).collect();

        assert_eq!(
            reasons,
            vec![
                "contains banned word: 诈骗",
                "contains banned word: 赌博",
                "contains banned word: 诈骗",
            ]
        );
    }

    #[test]
    fn test_scan_words_exact_match_only() {
        let vocab = vocabulary(&["spam"]);
        let tokens = vec!["Spam".to_string(), "spammer".to_string()];
        assert!(scan_words(&tokens, &vocab).is_empty());
    }

    #[test]
    fn test_scan_patterns_rule_order_then_position() {
        let text = "mail b@x.com then 13900001111 and a@y.org";
        let reasons: Vec<String> = scan_patterns(text, &builtin_rules())
            .iter()
            .map(|v| v.to_string())
            .collect();

        assert_eq!(
            reasons,
            vec![
                "contains phone_number: 13900001111",
                "contains email: b@x.com",
                "contains email: a@y.org",
            ]
        );
    }

    #[test]
    fn test_scan_patterns_custom_rule() {
        let rules = vec![RuleDefinition::custom("qq", r"QQ\d{5,}").compile().unwrap()];
        let violations = scan_patterns("加我QQ123456和QQ7654321", &rules);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_check_length_counts_chars() {
        assert_eq!(check_length("好评", DEFAULT_MIN_LENGTH), Some(Violation::TooShort));
        assert_eq!(check_length("abcd", DEFAULT_MIN_LENGTH), Some(Violation::TooShort));
        assert_eq!(check_length("非常好的商品", DEFAULT_MIN_LENGTH), None);
        assert_eq!(check_length("abcde", DEFAULT_MIN_LENGTH), None);
    }
}
