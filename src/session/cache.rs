use crate::llm::translator::TranslatedQuery;
use crate::query::executor::FilteredResult;
use crate::sampler::Draw;
use chrono::{DateTime, Utc};

/// Session state cache: the latest filtered result and the latest draw
///
/// Only successful actions write to it. A new filtered result always
/// clears the draw, so a draw can never outlive the rows it came from.
#[derive(Default)]
pub struct SessionCache {
    filtered: Option<CachedFilter>,
    draw: Option<Draw>,
}

#[derive(Clone, Debug)]
pub struct CachedFilter {
    /// SQL text that produced the result
    pub query: String,

    /// Set when the query came from the translator
    pub translated: Option<TranslatedQuery>,

    pub result: FilteredResult,

    pub cached_at: DateTime<Utc>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filtered result and drop the draw
    pub fn record_filter(&mut self, query: String, translated: Option<TranslatedQuery>, result: FilteredResult) {
        self.filtered = Some(CachedFilter {
            query,
            translated,
            result,
            cached_at: Utc::now(),
        });
        self.draw = None;
    }

    pub fn record_draw(&mut self, draw: Draw) {
        self.draw = Some(draw);
    }

    pub fn filtered(&self) -> Option<&CachedFilter> {
        self.filtered.as_ref()
    }

    pub fn draw(&self) -> Option<&Draw> {
        self.draw.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{DrawSeed, ReproducibleSampler};
    use crate::storage::dataset::Dataset;
    use crate::storage::value::Value;

    fn result(n: usize) -> FilteredResult {
        let headers = vec!["id".to_string()];
        let rows: Vec<Vec<Value>> = (0..n).map(|i| vec![Value::Int64(i as i64)]).collect();
        FilteredResult::unfiltered(&Dataset::from_rows(&headers, &rows).unwrap())
    }

    #[test]
    fn test_initial_state_is_empty() {
        let cache = SessionCache::new();
        assert!(cache.filtered().is_none());
        assert!(cache.draw().is_none());
    }

    #[test]
    fn test_new_filter_clears_draw() {
        let mut cache = SessionCache::new();
        cache.record_filter("SELECT * FROM df".to_string(), None, result(5));
        let draw = ReproducibleSampler::draw(&cache.filtered().unwrap().result, 2, DrawSeed(3)).unwrap();
        cache.record_draw(draw);
        assert!(cache.draw().is_some());

        cache.record_filter("SELECT * FROM df LIMIT 2".to_string(), None, result(2));
        assert!(cache.draw().is_none());
        assert_eq!(cache.filtered().unwrap().result.num_rows(), 2);
    }
}
