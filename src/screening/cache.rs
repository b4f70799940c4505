//! 分词缓存
//!
//! 以原始文本为键缓存分词结果。键不做任何归一化，
//! 仅空白不同的两段文本各自独立缓存。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::error::ScreeningError;
use super::segment::Segmenter;

/// 分词结果 (写入后不可变)
pub type Tokens = Arc<[String]>;

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// 当前条目数
    pub entries: usize,
    /// 容量上限 (0 表示不限)
    pub capacity: usize,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
}

struct Entry {
    generation: u64,
    tokens: Tokens,
}

/// 分词缓存
pub struct TokenCache {
    segmenter: Arc<dyn Segmenter>,
    entries: Mutex<LruCache<String, Entry>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TokenCache {
    /// 默认容量
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// 创建分词缓存
    ///
    /// # Arguments
    /// * `segmenter` - 外部分词器
    /// * `capacity` - 最大条目数，0 表示不限
    pub fn new(segmenter: Arc<dyn Segmenter>, capacity: usize) -> Self {
        let entries = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self {
            segmenter,
            entries: Mutex::new(entries),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 获取文本的分词结果
    ///
    /// 命中时直接返回已缓存的结果，不会再次调用分词器。
    /// 分词器在锁外执行；分词失败的结果不会被缓存。
    /// 条目记录写入时分词器的代数，代数变化后视为未命中。
    pub fn tokenize(&self, text: &str) -> Result<Tokens, ScreeningError> {
        let generation = self.segmenter.generation();
        {
            let mut entries = self.lock()?;
            if let Some(entry) = entries.get(text) {
                if entry.generation == generation {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(&entry.tokens));
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let tokens: Tokens = self.segmenter.segment(text)?.into();

        // 分词期间依据发生变化，结果不入缓存
        if self.segmenter.generation() != generation {
            return Ok(tokens);
        }

        let mut entries = self.lock()?;
        // 并发未命中时保留先写入的条目
        if let Some(existing) = entries.get(text) {
            if existing.generation == generation {
                return Ok(Arc::clone(&existing.tokens));
            }
        }
        entries.put(
            text.to_string(),
            Entry {
                generation,
                tokens: Arc::clone(&tokens),
            },
        );
        Ok(tokens)
    }

    /// 清空全部条目
    pub fn clear(&self) -> Result<(), ScreeningError> {
        self.lock()?.clear();
        Ok(())
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Entry>>, ScreeningError> {
        self.entries
            .lock()
            .map_err(|_| ScreeningError::LockPoisoned("token cache"))
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// 按字符切分并记录调用次数的分词器
    struct CountingSegmenter {
        calls: AtomicUsize,
    }

    impl Segmenter for CountingSegmenter {
        fn segment(&self, text: &str) -> Result<Vec<String>, ScreeningError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "boom" {
                return Err(ScreeningError::Segmentation("boom".into()));
            }
            Ok(text.chars().map(|c| c.to_string()).collect())
        }
    }

    fn counting_cache(capacity: usize) -> (Arc<CountingSegmenter>, TokenCache) {
        let segmenter = Arc::new(CountingSegmenter {
            calls: AtomicUsize::new(0),
        });
        let cache = TokenCache::new(segmenter.clone(), capacity);
        (segmenter, cache)
    }

    #[test]
    fn test_hit_does_not_resegment() {
        let (segmenter, cache) = counting_cache(16);

        let first = cache.tokenize("你好世界").unwrap();
        let second = cache.tokenize("你好世界").unwrap();

        assert_eq!(first, second);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_keys_are_not_normalized() {
        let (segmenter, cache) = counting_cache(16);

        cache.tokenize("abc").unwrap();
        cache.tokenize(" abc").unwrap();
        cache.tokenize("ABC").unwrap();

        assert_eq!(cache.len(), 3);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let (segmenter, cache) = counting_cache(16);

        cache.tokenize("hello").unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty());

        cache.tokenize("hello").unwrap();
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let (segmenter, cache) = counting_cache(16);

        assert!(cache.tokenize("boom").is_err());
        assert!(cache.tokenize("boom").is_err());
        assert!(cache.is_empty());
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let (_, cache) = counting_cache(2);

        cache.tokenize("a").unwrap();
        cache.tokenize("b").unwrap();
        cache.tokenize("a").unwrap();
        cache.tokenize("c").unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().capacity, 2);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let (_, cache) = counting_cache(0);
        for i in 0..100 {
            cache.tokenize(&format!("text-{i}")).unwrap();
        }
        assert_eq!(cache.len(), 100);
    }

    /// 代数可由测试调整的分词器
    struct VersionedSegmenter {
        generation: AtomicU64,
        calls: AtomicUsize,
    }

    impl Segmenter for VersionedSegmenter {
        fn segment(&self, text: &str) -> Result<Vec<String>, ScreeningError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let generation = self.generation.load(Ordering::SeqCst);
            Ok(vec![format!("{text}@{generation}")])
        }

        fn generation(&self) -> u64 {
            self.generation.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_generation_change_invalidates_entry() {
        let segmenter = Arc::new(VersionedSegmenter {
            generation: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        });
        let cache = TokenCache::new(segmenter.clone(), 16);

        assert_eq!(&cache.tokenize("abc").unwrap()[..], ["abc@0".to_string()]);
        assert_eq!(&cache.tokenize("abc").unwrap()[..], ["abc@0".to_string()]);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 1);

        segmenter.generation.store(1, Ordering::SeqCst);
        assert_eq!(&cache.tokenize("abc").unwrap()[..], ["abc@1".to_string()]);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);

        assert_eq!(&cache.tokenize("abc").unwrap()[..], ["abc@1".to_string()]);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 2);
    }
}
