//! Query Translator - natural-language condition to a candidate SQL query
//!
//! One completion call per condition, temperature 0, no retries. The returned
//! text is only cleaned of markup; validation is the executor's job.

use crate::config::DrawConfig;
use crate::error::{DrawError, DrawResult};
use crate::llm::backend::{build_backend, CompletionBackend};
use crate::llm::schema_summary::SchemaSummary;
use crate::storage::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A candidate query produced by the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedQuery {
    /// SQL text after markup stripping
    pub text: String,
    /// Condition it was translated from
    pub condition: String,
    /// Backend that produced it
    pub backend: String,
    pub elapsed_ms: u64,
}

pub struct QueryTranslator {
    backend: Arc<dyn CompletionBackend>,
    relation_name: String,
    sample_rows: usize,
    timeout: Duration,
}

impl QueryTranslator {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &DrawConfig) -> Self {
        Self {
            backend,
            relation_name: config.query.relation_name.clone(),
            sample_rows: config.query.sample_rows,
            timeout: config.llm.timeout(),
        }
    }

    /// Translator over the backend named in the config
    pub fn from_config(config: &DrawConfig) -> DrawResult<Self> {
        Ok(Self::new(build_backend(&config.llm)?, config))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Prompt for `condition` grounded in `summary`
    pub fn build_prompt(&self, condition: &str, summary: &SchemaSummary) -> String {
        format!(
            "You are a helpful assistant that converts natural language into SQL queries.\n\
             The target table is named \"{relation}\". Use only this table and the columns listed below.\n\
             \n\
             {schema}\n\
             \n\
             Write one SQLite SELECT statement that returns all columns (SELECT *) of the rows matching the condition.\n\
             - Double-quote column names that contain spaces or non-ASCII characters.\n\
             - Write text and date literals in single quotes, dates as 'YYYY-MM-DD'.\n\
             - Write booleans as TRUE or FALSE.\n\
             - Use LIKE for partial text matches.\n\
             \n\
             Condition: {condition}\n\
             \n\
             Return only the SQL query, with no explanation.",
            relation = self.relation_name,
            schema = summary.render(),
            condition = condition.trim(),
        )
    }

    /// Translate `condition` into SQL over `dataset`
    pub async fn translate(&self, condition: &str, dataset: &Dataset) -> DrawResult<TranslatedQuery> {
        if condition.trim().is_empty() {
            return Err(DrawError::invalid_condition("Enter a condition to filter candidates"));
        }

        let summary = SchemaSummary::from_dataset(dataset, self.sample_rows);
        let prompt = self.build_prompt(condition, &summary);
        debug!(prompt_len = prompt.len(), backend = self.backend.name(), "Sending translation request");

        let start = Instant::now();
        let raw = match tokio::time::timeout(self.timeout, self.backend.complete(&prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Translation timed out");
                return Err(DrawError::translation(format!(
                    "no response from {} within {}s",
                    self.backend.name(),
                    self.timeout.as_secs()
                )));
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let text = strip_query_markup(&raw);
        if text.is_empty() {
            return Err(DrawError::translation("the model returned an empty query"));
        }

        info!(backend = self.backend.name(), elapsed_ms, query = %text, "Translated condition");
        Ok(TranslatedQuery {
            text,
            condition: condition.trim().to_string(),
            backend: self.backend.name().to_string(),
            elapsed_ms,
        })
    }
}

/// Remove code fences (with or without a language tag) and surrounding whitespace
pub fn strip_query_markup(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_open = &trimmed[open + 3..];
    // Skip the language tag on the fence line, if any
    let body = match after_open.find('\n') {
        Some(newline) if !after_open[..newline].trim().contains(' ') => &after_open[newline + 1..],
        _ => after_open
            .strip_prefix("sql")
            .or_else(|| after_open.strip_prefix("SQL"))
            .unwrap_or(after_open),
    };
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::value::Value;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockBackend {
        reply: DrawResult<String>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for MockBackend {
        async fn complete(&self, prompt: &str) -> DrawResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn dataset() -> Dataset {
        let headers = vec!["name".to_string(), "age".to_string()];
        let rows = vec![vec![Value::String("Kim".into()), Value::Int64(34)]];
        Dataset::from_rows(&headers, &rows).unwrap()
    }

    #[test]
    fn test_strip_markup_variants() {
        assert_eq!(strip_query_markup("```sql\nSELECT * FROM df\n```"), "SELECT * FROM df");
        assert_eq!(strip_query_markup("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(strip_query_markup("  SELECT * FROM df  "), "SELECT * FROM df");
        assert_eq!(strip_query_markup("```sql SELECT * FROM df```"), "SELECT * FROM df");
        assert_eq!(
            strip_query_markup("Here you go:\n```SQL\nSELECT * FROM df WHERE age > 3;\n```"),
            "SELECT * FROM df WHERE age > 3;"
        );
    }

    #[tokio::test]
    async fn test_translate_strips_fences_and_grounds_prompt() {
        let backend = Arc::new(MockBackend::replying("```sql\nSELECT * FROM df WHERE age >= 30\n```"));
        let translator = QueryTranslator::new(backend.clone(), &DrawConfig::default());
        let translated = translator.translate("30 or older", &dataset()).await.unwrap();

        assert_eq!(translated.text, "SELECT * FROM df WHERE age >= 30");
        assert_eq!(translated.backend, "mock");
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The target table is named \"df\""));
        assert!(prompts[0].contains("Columns: name, age"));
        assert!(prompts[0].contains("Condition: 30 or older"));
    }

    #[tokio::test]
    async fn test_empty_condition_never_reaches_the_backend() {
        let backend = Arc::new(MockBackend::replying("SELECT 1"));
        let translator = QueryTranslator::new(backend.clone(), &DrawConfig::default());
        let err = translator.translate("   ", &dataset()).await.unwrap_err();
        assert!(matches!(err, DrawError::InvalidCondition { .. }));
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_completion_is_a_translation_error() {
        let backend = Arc::new(MockBackend::replying("```sql\n```"));
        let translator = QueryTranslator::new(backend, &DrawConfig::default());
        let err = translator.translate("anyone", &dataset()).await.unwrap_err();
        assert!(matches!(err, DrawError::Translation { .. }));
    }

    #[tokio::test]
    async fn test_backend_failure_is_propagated() {
        let backend = Arc::new(MockBackend {
            reply: Err(DrawError::translation_with_cause("connection refused", "os error 111")),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        });
        let translator = QueryTranslator::new(backend, &DrawConfig::default());
        match translator.translate("anyone", &dataset()).await {
            Err(DrawError::Translation { cause, .. }) => assert_eq!(cause.as_deref(), Some("os error 111")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_a_translation_error() {
        let backend = Arc::new(MockBackend {
            reply: Ok("SELECT * FROM df".to_string()),
            delay: Duration::from_millis(200),
            prompts: Mutex::new(Vec::new()),
        });
        let translator = QueryTranslator::new(backend, &DrawConfig::default())
            .with_timeout(Duration::from_millis(10));
        let err = translator.translate("anyone", &dataset()).await.unwrap_err();
        assert!(matches!(err, DrawError::Translation { .. }));
    }
}
