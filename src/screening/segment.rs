//! 分词器接口
//!
//! 分词算法本身属于外部组件，引擎只依赖 [`Segmenter`] trait。
//! 这里提供一个基于词典的正向最大匹配实现，保证引擎开箱可用。

use std::collections::HashSet;
use std::sync::Arc;

use super::error::ScreeningError;
use super::vocabulary::Vocabulary;

/// 将文本切分为有序 token 序列
///
/// 同一 [`generation`](Segmenter::generation) 下相同输入必须得到相同输出，结果会被缓存。
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Result<Vec<String>, ScreeningError>;

    /// 分词依据的代数；变化后旧的缓存结果失效
    fn generation(&self) -> u64 {
        0
    }
}

impl<F> Segmenter for F
where
    F: Fn(&str) -> Result<Vec<String>, ScreeningError> + Send + Sync,
{
    fn segment(&self, text: &str) -> Result<Vec<String>, ScreeningError> {
        self(text)
    }
}

/// 词典正向最大匹配分词器
///
/// - 空白字符作为分隔符丢弃
/// - 连续的 ASCII 字母数字合并为一个 token
/// - 其余字符按词典做最长匹配，未命中时单字成词
///
/// 词典是共享的 [`Vocabulary`]，运行时增删的词条立即参与分词。
#[derive(Debug, Clone)]
pub struct DictionarySegmenter {
    lexicon: Arc<Vocabulary>,
}

impl Default for DictionarySegmenter {
    fn default() -> Self {
        Self::shared(Arc::new(Vocabulary::new(Vec::<String>::new())))
    }
}

impl DictionarySegmenter {
    /// 使用固定词条创建
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::shared(Arc::new(Vocabulary::new(words)))
    }

    /// 以共享词库为词典
    pub fn shared(lexicon: Arc<Vocabulary>) -> Self {
        Self { lexicon }
    }

    /// 词典大小
    pub fn lexicon_len(&self) -> usize {
        self.lexicon.len()
    }
}

impl Segmenter for DictionarySegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>, ScreeningError> {
        self.lexicon
            .with_lexicon(|words, max_chars| segment_with(text, words, max_chars))
    }

    fn generation(&self) -> u64 {
        self.lexicon.generation()
    }
}

fn segment_with(text: &str, lexicon: &HashSet<String>, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphanumeric() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
            continue;
        }

        let len = longest_match(&chars[i..], lexicon, max_chars);
        tokens.push(chars[i..i + len].iter().collect());
        i += len;
    }

    tokens
}

fn longest_match(chars: &[char], lexicon: &HashSet<String>, max_chars: usize) -> usize {
    let limit = max_chars.min(chars.len());
    for n in (2..=limit).rev() {
        let candidate: String = chars[..n].iter().collect();
        if lexicon.contains(&candidate) {
            return n;
        }
    }
    1
}
