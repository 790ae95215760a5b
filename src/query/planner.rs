use crate::query::ast_to_expression::sql_expr_to_expression;
use crate::query::column_resolver::ColumnResolver;
use crate::query::expression::Expression;
use crate::query::parser::{parse_sql, read_only_select};
use crate::storage::dataset::Dataset;
use anyhow::{bail, Result};
use sqlparser::ast::{Expr, OrderByExpr, SelectItem, Value as SqlValue};

/// Output column of a plan
#[derive(Clone, Debug)]
pub struct Projection {
    pub name: String,
    pub source: ProjectionSource,
}

#[derive(Clone, Debug)]
pub enum ProjectionSource {
    /// Dataset column copied as-is
    Column(usize),
    /// Computed per row
    Computed(Expression),
}

impl ProjectionSource {
    pub fn as_expression(&self) -> Expression {
        match self {
            ProjectionSource::Column(idx) => Expression::Column(*idx),
            ProjectionSource::Computed(expr) => expr.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SortKey {
    pub expr: Expression,
    pub ascending: bool,
    pub nulls_first: bool,
}

/// Bound single-relation SELECT
#[derive(Clone, Debug)]
pub struct SelectPlan {
    pub projections: Vec<Projection>,
    pub filter: Option<Expression>,
    pub order_by: Vec<SortKey>,
    pub distinct: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Query planner - turns SQL text into a bound plan over one dataset
#[derive(Clone, Debug)]
pub struct QueryPlanner {
    relation_name: String,
}

impl QueryPlanner {
    pub fn new(relation_name: impl Into<String>) -> Self {
        Self {
            relation_name: relation_name.into(),
        }
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    /// Plan a query
    pub fn plan(&self, sql: &str, dataset: &Dataset) -> Result<SelectPlan> {
        let statement = parse_sql(sql)?;
        let guarded = read_only_select(&statement, &self.relation_name)?;
        let resolver = ColumnResolver::new(dataset, &self.relation_name, guarded.alias.as_deref());

        let projections = plan_projections(&guarded.select.projection, &resolver)?;
        let filter = guarded
            .select
            .selection
            .as_ref()
            .map(|expr| sql_expr_to_expression(expr, &resolver))
            .transpose()?;
        let order_by = guarded
            .query
            .order_by
            .iter()
            .map(|item| plan_sort_key(item, &projections, &resolver))
            .collect::<Result<Vec<_>>>()?;
        let limit = match &guarded.query.limit {
            Some(expr) => row_count(expr, "LIMIT")?,
            None => None,
        };
        let offset = match &guarded.query.offset {
            Some(offset) => row_count(&offset.value, "OFFSET")?.unwrap_or(0),
            None => 0,
        };

        Ok(SelectPlan {
            projections,
            filter,
            order_by,
            distinct: guarded.select.distinct.is_some(),
            limit,
            offset,
        })
    }
}

fn plan_projections(items: &[SelectItem], resolver: &ColumnResolver) -> Result<Vec<Projection>> {
    let all_columns = || {
        resolver
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| Projection {
                name: name.clone(),
                source: ProjectionSource::Column(idx),
            })
            .collect::<Vec<_>>()
    };

    let mut projections = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard(_) => projections.extend(all_columns()),
            SelectItem::QualifiedWildcard(name, _) => {
                let qualifier = name.to_string();
                if !resolver.is_qualifier(&qualifier) {
                    bail!("Unknown table '{}' in {}.*", qualifier, qualifier);
                }
                projections.extend(all_columns());
            }
            SelectItem::UnnamedExpr(expr) => {
                let bound = sql_expr_to_expression(expr, resolver)?;
                let projection = match bound {
                    Expression::Column(idx) => Projection {
                        name: resolver.columns()[idx].clone(),
                        source: ProjectionSource::Column(idx),
                    },
                    other => Projection {
                        name: expr.to_string(),
                        source: ProjectionSource::Computed(other),
                    },
                };
                projections.push(projection);
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let source = match sql_expr_to_expression(expr, resolver)? {
                    Expression::Column(idx) => ProjectionSource::Column(idx),
                    other => ProjectionSource::Computed(other),
                };
                projections.push(Projection {
                    name: alias.value.clone(),
                    source,
                });
            }
        }
    }
    Ok(projections)
}

/// ORDER BY accepts output positions and output aliases as well as expressions
fn plan_sort_key(item: &OrderByExpr, projections: &[Projection], resolver: &ColumnResolver) -> Result<SortKey> {
    let expr = match &item.expr {
        Expr::Value(SqlValue::Number(n, _)) => {
            let position: usize = n
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid ORDER BY position: {}", n))?;
            match position.checked_sub(1).and_then(|idx| projections.get(idx)) {
                Some(projection) => projection.source.as_expression(),
                None => bail!(
                    "ORDER BY position {} is out of range (1..={})",
                    position,
                    projections.len()
                ),
            }
        }
        Expr::Identifier(ident) if resolver.try_resolve(&ident.value).is_none() => {
            match projections.iter().find(|p| p.name == ident.value) {
                Some(projection) => projection.source.as_expression(),
                None => sql_expr_to_expression(&item.expr, resolver)?,
            }
        }
        other => sql_expr_to_expression(other, resolver)?,
    };

    let ascending = item.asc.unwrap_or(true);
    Ok(SortKey {
        expr,
        ascending,
        // NULL sorts as the smallest value unless told otherwise
        nulls_first: item.nulls_first.unwrap_or(ascending),
    })
}

/// LIMIT/OFFSET value; a negative count means "no limit"
fn row_count(expr: &Expr, clause: &str) -> Result<Option<usize>> {
    let text = match expr {
        Expr::Value(SqlValue::Number(n, _)) => n.clone(),
        Expr::UnaryOp { op: sqlparser::ast::UnaryOperator::Minus, expr } => match expr.as_ref() {
            Expr::Value(SqlValue::Number(_, _)) => return Ok(None),
            _ => bail!("{} must be an integer literal", clause),
        },
        _ => bail!("{} must be an integer literal", clause),
    };
    let count: usize = text
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be an integer literal, got {}", clause, text))?;
    Ok(Some(count))
}
