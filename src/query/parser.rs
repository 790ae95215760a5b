use sqlparser::ast::*;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use anyhow::{bail, Context, Result};

/// Parse exactly one SQL statement
pub fn parse_sql(query: &str) -> Result<Statement> {
    let dialect = GenericDialect {};
    let mut statements = Parser::parse_sql(&dialect, query).context("Failed to parse SQL query")?;

    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => bail!("Query is empty"),
        n => bail!("Expected a single statement, found {}", n),
    }
}

/// A statement that passed the read-only guard
pub struct ReadOnlySelect<'a> {
    pub query: &'a Query,
    pub select: &'a Select,
    /// Alias given to the relation in FROM, if any
    pub alias: Option<String>,
}

/// Accept only a plain SELECT over `relation_name`
pub fn read_only_select<'a>(statement: &'a Statement, relation_name: &str) -> Result<ReadOnlySelect<'a>> {
    let query = match statement {
        Statement::Query(query) => query.as_ref(),
        other => bail!(
            "Only SELECT queries are supported, got: {}",
            statement_keyword(other)
        ),
    };

    if query.with.is_some() {
        bail!("WITH clauses are not supported");
    }
    if !query.locks.is_empty() {
        bail!("Locking clauses are not supported");
    }
    if query.fetch.is_some() {
        bail!("FETCH is not supported: use LIMIT");
    }
    if !query.limit_by.is_empty() {
        bail!("LIMIT BY is not supported");
    }
    if query.for_clause.is_some() {
        bail!("FOR XML/JSON clauses are not supported");
    }

    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select.as_ref(),
        SetExpr::SetOperation { op, .. } => bail!("Set operations ({}) are not supported", op),
        SetExpr::Query(_) => bail!("Nested queries are not supported"),
        _ => bail!("Only SELECT queries are supported"),
    };

    if select.into.is_some() {
        bail!("SELECT INTO is not supported");
    }
    if let Some(Distinct::On(_)) = &select.distinct {
        bail!("DISTINCT ON is not supported");
    }
    match &select.group_by {
        GroupByExpr::All => bail!("GROUP BY is not supported: the query must return candidate rows"),
        GroupByExpr::Expressions(exprs) if !exprs.is_empty() => {
            bail!("GROUP BY is not supported: the query must return candidate rows")
        }
        _ => {}
    }
    if select.having.is_some() {
        bail!("HAVING is not supported");
    }
    if select.top.is_some() {
        bail!("TOP is not supported: use LIMIT");
    }
    if select.qualify.is_some() {
        bail!("QUALIFY is not supported");
    }
    if !select.named_window.is_empty() {
        bail!("WINDOW clauses are not supported");
    }
    if !select.lateral_views.is_empty() {
        bail!("LATERAL VIEW is not supported");
    }
    if !select.sort_by.is_empty() || !select.cluster_by.is_empty() || !select.distribute_by.is_empty() {
        bail!("SORT BY / CLUSTER BY / DISTRIBUTE BY are not supported: use ORDER BY");
    }

    let alias = single_relation(select, relation_name)?;
    Ok(ReadOnlySelect { query, select, alias })
}

/// Check FROM names exactly our relation, returning its alias
fn single_relation(select: &Select, relation_name: &str) -> Result<Option<String>> {
    let table = match select.from.as_slice() {
        [table] => table,
        [] => bail!("Query must read FROM {}", relation_name),
        _ => bail!("Query may only read from a single table ({})", relation_name),
    };
    if !table.joins.is_empty() {
        bail!("Joins are not supported");
    }

    match &table.relation {
        TableFactor::Table { name, alias, .. } => {
            let parts = &name.0;
            let matches = parts.len() == 1 && parts[0].value.eq_ignore_ascii_case(relation_name);
            if !matches {
                bail!("Unknown table '{}': queries may only read from '{}'", name, relation_name);
            }
            Ok(alias.as_ref().map(|a| a.name.value.clone()))
        }
        TableFactor::Derived { .. } => bail!("Subqueries in FROM are not supported"),
        other => bail!("Unsupported FROM clause: {}", other),
    }
}

fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(sql: &str) -> Result<Option<String>> {
        let statement = parse_sql(sql)?;
        read_only_select(&statement, "df").map(|s| s.alias)
    }

    #[test]
    fn test_plain_select_accepted() {
        assert_eq!(guard("SELECT * FROM df WHERE age > 30").unwrap(), None);
        assert_eq!(guard("SELECT d.name FROM DF AS d").unwrap(), Some("d".to_string()));
    }

    #[test]
    fn test_non_select_rejected() {
        let err = guard("DELETE FROM df WHERE 1 = 1").unwrap_err();
        assert!(err.to_string().contains("DELETE"));
        assert!(guard("DROP TABLE df").is_err());
        assert!(guard("UPDATE df SET age = 1").is_err());
        assert!(guard("INSERT INTO df VALUES (1)").is_err());
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert!(guard("SELECT * FROM df; DROP TABLE df").is_err());
    }

    #[test]
    fn test_other_shapes_rejected() {
        assert!(guard("SELECT * FROM users").is_err());
        assert!(guard("SELECT * FROM df JOIN other ON df.id = other.id").is_err());
        assert!(guard("SELECT * FROM df UNION SELECT * FROM df").is_err());
        assert!(guard("WITH x AS (SELECT * FROM df) SELECT * FROM x").is_err());
        assert!(guard("SELECT gender FROM df GROUP BY gender").is_err());
        assert!(guard("SELECT * FROM (SELECT * FROM df) AS t").is_err());
        assert!(guard("SELECT 1").is_err());
    }

    #[test]
    fn test_row_limiting_dialects_rejected() {
        let err = guard("SELECT TOP 1 * FROM df").unwrap_err();
        assert!(err.to_string().contains("LIMIT"));
        let err = guard("SELECT * FROM df FETCH FIRST 1 ROWS ONLY").unwrap_err();
        assert!(err.to_string().contains("LIMIT"));
        assert!(guard("SELECT * FROM df QUALIFY age > 1").is_err());
        assert!(guard("SELECT * FROM df SORT BY age").is_err());
        assert!(guard("SELECT * FROM df LIMIT 1").is_ok());
    }
}
