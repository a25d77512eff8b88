//! Optimization history and result reuse, both bounded LRU maps

use super::models::{OptimizationConstraints, TechniqueOutput};
use super::techniques::Technique;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

const TASK_PREFIX_CHARS: usize = 50;

/// Least-recently-used map; the front entry is evicted first
#[derive(Debug, Clone)]
pub struct BoundedLru<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V> BoundedLru<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Look up and mark as most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, v)| v)
    }

    /// Look up without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        if let Some(index) = self.entries.get_index_of(&key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(index, last);
        } else {
            self.evict_for_insert();
        }
        self.entries.entry(key).or_insert_with(make)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.shift_remove(&key);
        } else {
            self.evict_for_insert();
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_for_insert(&mut self) {
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
    }
}

/// History key: leading task text, budget, and quality in thousandths
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSignature {
    pub task_prefix: String,
    pub token_budget: usize,
    pub quality_millis: u32,
}

impl TaskSignature {
    pub fn new(task: &str, constraints: &OptimizationConstraints) -> Self {
        Self {
            task_prefix: task.chars().take(TASK_PREFIX_CHARS).collect(),
            token_budget: constraints.token_budget,
            quality_millis: quality_millis(constraints.quality_requirement),
        }
    }
}

/// Exact-task key for reusing whole results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub task: String,
    pub token_budget: usize,
    pub quality_millis: u32,
}

impl ResultKey {
    pub fn new(task: &str, constraints: &OptimizationConstraints) -> Self {
        Self {
            task: task.to_string(),
            token_budget: constraints.token_budget,
            quality_millis: quality_millis(constraints.quality_requirement),
        }
    }
}

fn quality_millis(quality: f64) -> u32 {
    (quality.clamp(0.0, 1.0) * 1000.0).round() as u32
}

/// Running performance of one technique under one signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechniqueStats {
    pub usage_count: u64,
    pub average_quality: f64,
    pub average_tokens: f64,
}

impl TechniqueStats {
    fn observe(&mut self, quality: f64, tokens: usize) {
        self.usage_count += 1;
        let n = self.usage_count as f64;
        self.average_quality += (quality - self.average_quality) / n;
        self.average_tokens += (tokens as f64 - self.average_tokens) / n;
    }
}

/// Per-signature technique performance, used to bias selection
#[derive(Debug, Clone)]
pub struct OptimizationHistory {
    records: BoundedLru<TaskSignature, HashMap<Technique, TechniqueStats>>,
}

impl OptimizationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: BoundedLru::new(capacity),
        }
    }

    pub fn record(&mut self, signature: TaskSignature, technique: Technique, quality: f64, tokens: usize) {
        self.records
            .get_or_insert_with(signature, HashMap::new)
            .entry(technique)
            .or_default()
            .observe(quality, tokens);
    }

    /// Average quality of a technique under a signature, if it was ever used
    pub fn average_quality(&self, signature: &TaskSignature, technique: Technique) -> Option<f64> {
        self.records
            .peek(signature)
            .and_then(|stats| stats.get(&technique))
            .map(|s| s.average_quality)
    }

    pub fn stats(&self, signature: &TaskSignature, technique: Technique) -> Option<TechniqueStats> {
        self.records
            .peek(signature)
            .and_then(|stats| stats.get(&technique))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stored outputs for the adaptive caching technique
pub type ResultCache = BoundedLru<ResultKey, TechniqueOutput>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_least_recent() {
        let mut lru = BoundedLru::new(2);
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.get(&"a"), Some(&1));
        lru.insert("c", 3);

        assert!(lru.peek(&"b").is_none());
        assert_eq!(lru.peek(&"a"), Some(&1));
        assert_eq!(lru.peek(&"c"), Some(&3));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut lru = BoundedLru::new(2);
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.insert("a", 10);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.peek(&"a"), Some(&10));
        assert_eq!(lru.peek(&"b"), Some(&2));
    }

    #[test]
    fn test_signature_truncates_task() {
        let task = "x".repeat(80);
        let sig = TaskSignature::new(&task, &OptimizationConstraints::new(500).with_quality(0.75));
        assert_eq!(sig.task_prefix.len(), 50);
        assert_eq!(sig.quality_millis, 750);
    }

    #[test]
    fn test_running_averages() {
        let mut history = OptimizationHistory::new(4);
        let sig = TaskSignature::new("fix login", &OptimizationConstraints::new(500));
        history.record(sig.clone(), Technique::ContextualFiltering, 0.8, 400);
        history.record(sig.clone(), Technique::ContextualFiltering, 0.6, 200);

        let stats = history.stats(&sig, Technique::ContextualFiltering).unwrap();
        assert_eq!(stats.usage_count, 2);
        assert!((stats.average_quality - 0.7).abs() < 1e-9);
        assert!((stats.average_tokens - 300.0).abs() < 1e-9);
        assert!(history.average_quality(&sig, Technique::SmartSummarization).is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = OptimizationHistory::new(3);
        for i in 0..10 {
            let sig = TaskSignature::new(&format!("task {}", i), &OptimizationConstraints::new(100));
            history.record(sig, Technique::ExtremeCompression, 0.5, 50);
        }
        assert_eq!(history.len(), 3);
    }
}
