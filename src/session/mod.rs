//! Draw session - one operator's dataset, cached results and audit trail
//!
//! Every action takes `&mut self` and either completes or leaves the cached
//! state exactly as it was.

pub mod audit_log;
pub mod cache;

pub use audit_log::{AuditEvent, AuditLog, AuditLogEntry, Stage};
pub use cache::{CachedFilter, SessionCache};

use crate::config::{DrawConfig, IngestionConfig};
use crate::error::{DrawError, DrawResult};
use crate::ingestion::alias::{AliasMapping, AliasReport};
use crate::ingestion::tabular::load_dataset;
use crate::llm::translator::{QueryTranslator, TranslatedQuery};
use crate::query::executor::{FilteredResult, QueryExecutor};
use crate::result_format::to_csv_with_bom;
use crate::sampler::{Draw, DrawSeed, ReproducibleSampler};
use crate::storage::dataset::Dataset;
use std::time::Instant;
use tracing::{info, warn};

pub struct DrawSession {
    dataset: Dataset,
    alias_report: Option<AliasReport>,
    executor: QueryExecutor,
    cache: SessionCache,
    audit_log: AuditLog,
    ingestion: IngestionConfig,
    fixed_seed: Option<u64>,
}

impl DrawSession {
    pub fn new(dataset: Dataset, config: &DrawConfig) -> Self {
        info!(
            rows = dataset.num_rows(),
            columns = dataset.num_columns(),
            "Session started"
        );
        Self {
            dataset,
            alias_report: None,
            executor: QueryExecutor::new(config.query.relation_name.clone()),
            cache: SessionCache::new(),
            audit_log: AuditLog::new(config.audit.max_entries),
            ingestion: config.ingestion.clone(),
            fixed_seed: config.sampler.seed,
        }
    }

    /// Start a session from an uploaded workbook or CSV
    pub fn from_upload(bytes: &[u8], config: &DrawConfig) -> DrawResult<Self> {
        let dataset = load_dataset(bytes, &config.ingestion)?;
        Ok(Self::new(dataset, config))
    }

    /// Add alias columns; on error the dataset is unchanged
    pub fn apply_alias_mapping(&mut self, mapping: &AliasMapping) -> DrawResult<&AliasReport> {
        match mapping.apply(&self.dataset) {
            Ok((augmented, report)) => {
                self.dataset = augmented;
                Ok(self.alias_report.insert(report))
            }
            Err(err) => Err(self.record_failure(Stage::Mapping, err)),
        }
    }

    /// Parse a mapping upload and apply it
    pub fn apply_alias_mapping_bytes(&mut self, bytes: &[u8]) -> DrawResult<&AliasReport> {
        let mapping = match AliasMapping::from_bytes(bytes, self.ingestion.mapping_orientation, &self.ingestion) {
            Ok(mapping) => mapping,
            Err(err) => return Err(self.record_failure(Stage::Mapping, err)),
        };
        self.apply_alias_mapping(&mapping)
    }

    /// Translate `condition`, execute it and cache the result
    pub async fn filter(&mut self, condition: &str, translator: &QueryTranslator) -> DrawResult<&FilteredResult> {
        let translated = match translator.translate(condition, &self.dataset).await {
            Ok(translated) => translated,
            Err(err) => return Err(self.record_failure(Stage::Translation, err)),
        };
        self.audit_log.log(AuditEvent::Translated {
            condition: translated.condition.clone(),
            query: translated.text.clone(),
            backend: translated.backend.clone(),
            elapsed_ms: translated.elapsed_ms,
        });
        let sql = translated.text.clone();
        self.run_query(sql, Some(translated))
    }

    /// Execute an operator-supplied query and cache the result
    pub fn filter_with_query(&mut self, sql: &str) -> DrawResult<&FilteredResult> {
        self.run_query(sql.trim().to_string(), None)
    }

    fn run_query(&mut self, sql: String, translated: Option<TranslatedQuery>) -> DrawResult<&FilteredResult> {
        let start = Instant::now();
        let result = match self.executor.execute(&sql, &self.dataset) {
            Ok(result) => result,
            Err(err) => return Err(self.record_failure(Stage::Execution, err)),
        };

        self.audit_log.log(AuditEvent::Filtered {
            query: sql.clone(),
            row_count: result.num_rows(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        });
        self.cache.record_filter(sql, translated, result);
        self.cache
            .filtered()
            .map(|cached| &cached.result)
            .ok_or_else(|| DrawError::query_execution("filtered result was not cached"))
    }

    /// Draw `k` winners from the current candidates
    ///
    /// Before any filter has run, every dataset row is a candidate. When the
    /// current filter matched nothing this returns `Ok(None)` and leaves the
    /// cache alone.
    pub fn draw(&mut self, k: usize, seed: Option<DrawSeed>) -> DrawResult<Option<&Draw>> {
        let unfiltered;
        let pool = match self.cache.filtered() {
            Some(cached) => &cached.result,
            None => {
                unfiltered = FilteredResult::unfiltered(&self.dataset);
                &unfiltered
            }
        };
        if pool.is_empty() {
            info!("No candidates match the current condition");
            return Ok(None);
        }

        let seed = seed
            .or(self.fixed_seed.map(DrawSeed))
            .unwrap_or_else(DrawSeed::random);
        let draw = match ReproducibleSampler::draw(pool, k, seed) {
            Ok(draw) => draw,
            Err(err) => {
                warn!(error = %err, "Draw rejected");
                self.audit_log.log(AuditEvent::Failed {
                    stage: Stage::Draw,
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        self.audit_log.log(AuditEvent::Drawn {
            seed: seed.value(),
            k,
            source_rows: draw.source_rows.clone(),
        });
        self.cache.record_draw(draw);
        Ok(self.cache.draw())
    }

    fn record_failure(&mut self, stage: Stage, err: DrawError) -> DrawError {
        warn!(?stage, error = %err, "Action failed");
        self.audit_log.log(AuditEvent::Failed {
            stage,
            message: err.to_string(),
        });
        err
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filtered_result(&self) -> Option<&FilteredResult> {
        self.cache.filtered().map(|cached| &cached.result)
    }

    /// The SQL behind the current filtered result
    pub fn current_query(&self) -> Option<&str> {
        self.cache.filtered().map(|cached| cached.query.as_str())
    }

    pub fn translated_query(&self) -> Option<&TranslatedQuery> {
        self.cache.filtered().and_then(|cached| cached.translated.as_ref())
    }

    pub fn current_draw(&self) -> Option<&Draw> {
        self.cache.draw()
    }

    /// Size of the pool the next draw picks from
    pub fn candidate_count(&self) -> usize {
        match self.cache.filtered() {
            Some(cached) => cached.result.num_rows(),
            None => self.dataset.num_rows(),
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn alias_report(&self) -> Option<&AliasReport> {
        self.alias_report.as_ref()
    }

    /// The current draw as BOM-prefixed CSV, if there is one
    pub fn export_draw_csv(&self) -> DrawResult<Option<Vec<u8>>> {
        self.cache
            .draw()
            .map(|draw| to_csv_with_bom(&draw.rows))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::value::Value;

    fn session() -> DrawSession {
        let headers = vec!["name".to_string(), "age".to_string()];
        let rows: Vec<Vec<Value>> = (0..6)
            .map(|i| vec![Value::String(format!("p{}", i)), Value::Int64(20 + i * 5)])
            .collect();
        DrawSession::new(Dataset::from_rows(&headers, &rows).unwrap(), &DrawConfig::default())
    }

    #[test]
    fn test_draw_before_filter_uses_whole_dataset() {
        let mut session = session();
        assert_eq!(session.candidate_count(), 6);
        let draw = session.draw(6, Some(DrawSeed(5))).unwrap().unwrap();
        assert_eq!(draw.len(), 6);
    }

    #[test]
    fn test_filter_then_draw() {
        let mut session = session();
        let matched = session.filter_with_query("SELECT * FROM df WHERE age >= 35").unwrap().num_rows();
        assert_eq!(matched, 3);
        let draw = session.draw(2, Some(DrawSeed(1))).unwrap().unwrap();
        assert!(draw.source_rows.iter().all(|&row| row >= 3));
        assert_eq!(session.current_query(), Some("SELECT * FROM df WHERE age >= 35"));
    }

    #[test]
    fn test_failed_query_keeps_previous_state() {
        let mut session = session();
        session.filter_with_query("SELECT * FROM df WHERE age > 30").unwrap();
        session.draw(1, Some(DrawSeed(9))).unwrap();

        assert!(session.filter_with_query("DROP TABLE df").is_err());
        assert_eq!(session.current_query(), Some("SELECT * FROM df WHERE age > 30"));
        assert!(session.current_draw().is_some());
        assert!(matches!(
            session.audit_log().last().map(|e| &e.event),
            Some(AuditEvent::Failed { stage: Stage::Execution, .. })
        ));
    }

    #[test]
    fn test_fixed_seed_from_config() {
        let mut config = DrawConfig::default();
        config.sampler.seed = Some(77);
        let dataset = session().dataset().clone();

        let mut a = DrawSession::new(dataset.clone(), &config);
        let mut b = DrawSession::new(dataset, &config);
        let first = a.draw(3, None).unwrap().unwrap().source_rows.clone();
        let second = b.draw(3, None).unwrap().unwrap().source_rows.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_requires_a_draw() {
        let mut session = session();
        assert!(session.export_draw_csv().unwrap().is_none());
        session.draw(2, Some(DrawSeed(2))).unwrap();
        let bytes = session.export_draw_csv().unwrap().unwrap();
        assert!(bytes.starts_with("\u{FEFF}name,age".as_bytes()));
    }
}
