//! 敏感词库
//!
//! 维护可变的敏感词集合，支持加载、保存、增删。
//! 加载失败时回退到内置默认词库，只记录日志，不向调用方报错。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use super::error::ScreeningError;
use crate::storage::atomic::atomic_write_str;

/// 内置默认敏感词
pub const DEFAULT_WORDS: &[&str] = &["脏话", "骂人", "违禁品", "色情", "赌博", "诈骗"];

/// 词库文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyFormat {
    /// JSON 字符串数组
    Json,
    /// 纯文本，每行一个词
    Plain,
}

impl VocabularyFormat {
    /// 根据扩展名推断格式，`.json` 以外一律视为纯文本
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Plain,
        }
    }
}

/// 词库来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VocabularySource {
    /// 从文件加载
    File { path: PathBuf, count: usize },
    /// 使用内置默认词库
    Fallback { count: usize },
}

/// 结构化词库文件的两种形态
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VocabularyDocument {
    List(Vec<String>),
    Object { words: Vec<String> },
}

/// 词集合及其最长词条的字符数
#[derive(Debug, Default)]
struct WordSet {
    words: HashSet<String>,
    max_chars: usize,
}

impl WordSet {
    fn from_words(words: HashSet<String>) -> Self {
        let max_chars = words.iter().map(|w| w.chars().count()).max().unwrap_or(0);
        Self { words, max_chars }
    }

    fn insert(&mut self, word: String) -> bool {
        let chars = word.chars().count();
        let inserted = self.words.insert(word);
        if inserted {
            self.max_chars = self.max_chars.max(chars);
        }
        inserted
    }

    fn remove(&mut self, word: &str) -> bool {
        let removed = self.words.remove(word);
        if removed && word.chars().count() == self.max_chars {
            self.max_chars = self.words.iter().map(|w| w.chars().count()).max().unwrap_or(0);
        }
        removed
    }
}

/// 敏感词库
///
/// 每次修改都会递增 [`generation`](Self::generation)，
/// 依赖词库的分词结果据此判断是否过期。
#[derive(Debug)]
pub struct Vocabulary {
    words: RwLock<WordSet>,
    generation: AtomicU64,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Vocabulary {
    /// 使用给定词条创建词库
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .filter_map(|w| normalize_word(w.as_ref()))
            .collect();
        Self {
            words: RwLock::new(WordSet::from_words(words)),
            generation: AtomicU64::new(0),
        }
    }

    /// 使用内置默认词库创建
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_WORDS)
    }

    /// 从文件创建词库，失败时回退到默认词库
    pub fn from_source(path: Option<&Path>) -> (Self, VocabularySource) {
        let vocabulary = Self::new(Vec::<String>::new());
        let source = vocabulary.load(path);
        (vocabulary, source)
    }

    /// 加载词库，整体替换当前词条
    ///
    /// 支持 JSON 数组、带 `words` 字段的 JSON 对象、每行一个词的纯文本。
    /// 文件缺失、不可读或结构无法识别时回退到默认词库。
    pub fn load(&self, path: Option<&Path>) -> VocabularySource {
        let (words, source) = match path {
            Some(path) => match read_vocabulary(path) {
                Ok(words) => {
                    let words: HashSet<String> = words.iter().filter_map(|w| normalize_word(w)).collect();
                    tracing::info!(path = %path.display(), count = words.len(), "vocabulary loaded");
                    let count = words.len();
                    (
                        words,
                        VocabularySource::File {
                            path: path.to_path_buf(),
                            count,
                        },
                    )
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load vocabulary, falling back to defaults"
                    );
                    default_source()
                }
            },
            None => {
                tracing::info!("no vocabulary source configured, using defaults");
                default_source()
            }
        };

        let words = WordSet::from_words(words);
        match self.words.write() {
            Ok(mut guard) => {
                *guard = words;
                self.bump();
            }
            Err(poisoned) => {
                tracing::warn!("vocabulary lock poisoned, replacing contents");
                *poisoned.into_inner() = words;
                self.bump();
                self.words.clear_poison();
            }
        }

        source
    }

    /// 保存词库
    ///
    /// 输出按字典序排序，保证同一词库写出的文件稳定。
    pub fn save(&self, path: &Path, format: VocabularyFormat) -> Result<(), ScreeningError> {
        let words = self.words()?;
        let content = match format {
            VocabularyFormat::Json => serde_json::to_string_pretty(&words)?,
            VocabularyFormat::Plain => {
                let mut content = words.join("\n");
                content.push('\n');
                content
            }
        };

        atomic_write_str(path, &content)?;
        tracing::info!(path = %path.display(), count = words.len(), ?format, "vocabulary saved");
        Ok(())
    }

    /// 添加敏感词，返回实际新增数量
    ///
    /// 词条先去除首尾空白；空白词、含换行的词和已存在的词会被忽略。
    pub fn add<I, S>(&self, words: I) -> Result<usize, ScreeningError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = self.write()?;
        let added = words
            .into_iter()
            .filter_map(|w| normalize_word(w.as_ref()))
            .filter(|w| guard.insert(w.clone()))
            .count();
        if added > 0 {
            self.bump();
        }
        Ok(added)
    }

    /// 删除敏感词，返回实际删除数量
    pub fn remove<I, S>(&self, words: I) -> Result<usize, ScreeningError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = self.write()?;
        let removed = words
            .into_iter()
            .filter(|w| guard.remove(w.as_ref().trim()))
            .count();
        if removed > 0 {
            self.bump();
        }
        Ok(removed)
    }

    /// 精确匹配 (区分大小写)
    pub fn contains(&self, word: &str) -> bool {
        self.read().map(|guard| guard.words.contains(word)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.read().map(|guard| guard.words.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 修改代数，每次实际变更后递增
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// 排序后的词条快照
    pub fn words(&self) -> Result<Vec<String>, ScreeningError> {
        let guard = self.read()?;
        let mut words: Vec<String> = guard.words.iter().cloned().collect();
        words.sort();
        Ok(words)
    }

    /// 在读锁下访问词集合
    ///
    /// 闭包执行期间词库不会被修改，一次扫描看到的是同一份词集合。
    pub fn with_words<R>(&self, f: impl FnOnce(&HashSet<String>) -> R) -> Result<R, ScreeningError> {
        let guard = self.read()?;
        Ok(f(&guard.words))
    }

    /// 在读锁下访问词集合和最长词条的字符数
    pub(crate) fn with_lexicon<R>(&self, f: impl FnOnce(&HashSet<String>, usize) -> R) -> Result<R, ScreeningError> {
        let guard = self.read()?;
        Ok(f(&guard.words, guard.max_chars))
    }

    /// 必须在持有写锁时调用
    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, WordSet>, ScreeningError> {
        self.words
            .read()
            .map_err(|_| ScreeningError::LockPoisoned("vocabulary"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, WordSet>, ScreeningError> {
        self.words
            .write()
            .map_err(|_| ScreeningError::LockPoisoned("vocabulary"))
    }
}

/// 去除首尾空白；空白词和含换行的词无法按行保存，视为无效
fn normalize_word(word: &str) -> Option<String> {
    let word = word.trim();
    if word.is_empty() || word.contains(['\n', '\r']) {
        return None;
    }
    Some(word.to_string())
}

fn default_source() -> (HashSet<String>, VocabularySource) {
    let words: HashSet<String> = DEFAULT_WORDS.iter().map(|w| w.to_string()).collect();
    let count = words.len();
    (words, VocabularySource::Fallback { count })
}

/// 读取词库文件
fn read_vocabulary(path: &Path) -> Result<Vec<String>, ScreeningError> {
    let content = fs::read_to_string(path)?;
    parse_vocabulary(&content)
}

/// 解析词库内容
///
/// 以 `[` 或 `{` 开头的内容按 JSON 解析，其余按行解析。
fn parse_vocabulary(content: &str) -> Result<Vec<String>, ScreeningError> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let words = match serde_json::from_str::<VocabularyDocument>(trimmed) {
            Ok(VocabularyDocument::List(words)) => words,
            Ok(VocabularyDocument::Object { words }) => words,
            Err(e) => {
                return Err(ScreeningError::Config(format!(
                    "Unsupported vocabulary document: {}",
                    e
                )))
            }
        };
        return Ok(words);
    }

    Ok(trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
