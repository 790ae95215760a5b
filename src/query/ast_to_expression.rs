/// Convert SQL AST expressions to bound Expressions
/// Column references are resolved here, so unknown columns fail before any row is read
use sqlparser::ast::*;
use crate::query::column_resolver::ColumnResolver;
use crate::query::expression::{
    function_arity, like_regex, CastType, DatePart, Expression, AGGREGATE_FUNCTIONS,
};
use crate::storage::value::Value;
use anyhow::{bail, Result};
use tracing::debug;

pub fn sql_expr_to_expression(expr: &Expr, resolver: &ColumnResolver) -> Result<Expression> {
    let bind = |e: &Expr| sql_expr_to_expression(e, resolver);
    let bind_boxed = |e: &Expr| sql_expr_to_expression(e, resolver).map(Box::new);

    match expr {
        Expr::Identifier(ident) => match resolver.resolve(&ident.value) {
            Ok(idx) => Ok(Expression::Column(idx)),
            // SQLite reads an unmatched double-quoted identifier as a string literal
            Err(_) if ident.quote_style == Some('"') => {
                debug!(literal = %ident.value, "Treating unmatched quoted identifier as text");
                Ok(Expression::Literal(Value::String(ident.value.clone())))
            }
            Err(e) => Err(e),
        },
        Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [qualifier, column] => Ok(Expression::Column(
                resolver.resolve_qualified(&qualifier.value, &column.value)?,
            )),
            _ => bail!("Unsupported column reference: {}", expr),
        },
        Expr::Value(val) => Ok(Expression::Literal(literal_value(val)?)),
        Expr::TypedString { data_type, value } => Ok(Expression::Cast {
            expr: Box::new(Expression::Literal(Value::String(value.clone()))),
            target: cast_target(data_type)?,
        }),
        Expr::Nested(inner) => bind(inner),
        Expr::BinaryOp { left, op, right } => {
            use crate::query::expression::BinaryOperator as ExprBinaryOp;
            use sqlparser::ast::BinaryOperator as SqlBinaryOp;
            let bin_op = match op {
                SqlBinaryOp::Plus => ExprBinaryOp::Add,
                SqlBinaryOp::Minus => ExprBinaryOp::Subtract,
                SqlBinaryOp::Multiply => ExprBinaryOp::Multiply,
                SqlBinaryOp::Divide => ExprBinaryOp::Divide,
                SqlBinaryOp::Modulo => ExprBinaryOp::Modulo,
                SqlBinaryOp::Gt => ExprBinaryOp::Gt,
                SqlBinaryOp::GtEq => ExprBinaryOp::Ge,
                SqlBinaryOp::Lt => ExprBinaryOp::Lt,
                SqlBinaryOp::LtEq => ExprBinaryOp::Le,
                SqlBinaryOp::Eq => ExprBinaryOp::Eq,
                SqlBinaryOp::NotEq => ExprBinaryOp::Ne,
                SqlBinaryOp::And => ExprBinaryOp::And,
                SqlBinaryOp::Or => ExprBinaryOp::Or,
                SqlBinaryOp::StringConcat => ExprBinaryOp::Concat,
                _ => bail!("Unsupported binary operator: {}", op),
            };
            Ok(Expression::BinaryOp {
                left: bind_boxed(left)?,
                op: bin_op,
                right: bind_boxed(right)?,
            })
        }
        Expr::UnaryOp { op, expr: inner } => {
            use crate::query::expression::UnaryOperator as ExprUnaryOp;
            use sqlparser::ast::UnaryOperator as SqlUnaryOp;
            let unary_op = match op {
                SqlUnaryOp::Plus => ExprUnaryOp::Plus,
                SqlUnaryOp::Minus => ExprUnaryOp::Negate,
                SqlUnaryOp::Not => ExprUnaryOp::Not,
                _ => bail!("Unsupported unary operator: {}", op),
            };
            Ok(Expression::UnaryOp {
                op: unary_op,
                expr: bind_boxed(inner)?,
            })
        }
        Expr::IsNull(inner) => Ok(Expression::IsNull { expr: bind_boxed(inner)?, negated: false }),
        Expr::IsNotNull(inner) => Ok(Expression::IsNull { expr: bind_boxed(inner)?, negated: true }),
        Expr::IsTrue(inner) => Ok(Expression::IsBool { expr: bind_boxed(inner)?, value: true }),
        Expr::IsFalse(inner) => Ok(Expression::IsBool { expr: bind_boxed(inner)?, value: false }),
        Expr::IsNotTrue(inner) => Ok(negate(Expression::IsBool { expr: bind_boxed(inner)?, value: true })),
        Expr::IsNotFalse(inner) => Ok(negate(Expression::IsBool { expr: bind_boxed(inner)?, value: false })),
        Expr::InList { expr: inner, list, negated } => Ok(Expression::In {
            expr: bind_boxed(inner)?,
            list: list.iter().map(bind).collect::<Result<Vec<_>>>()?,
            negated: *negated,
        }),
        Expr::Between { expr: inner, negated, low, high } => Ok(Expression::Between {
            expr: bind_boxed(inner)?,
            low: bind_boxed(low)?,
            high: bind_boxed(high)?,
            negated: *negated,
        }),
        Expr::Like { negated, expr: inner, pattern, escape_char }
        | Expr::ILike { negated, expr: inner, pattern, escape_char } => {
            let pattern = bind(pattern)?;
            let compiled = match &pattern {
                Expression::Literal(Value::String(p)) => Some(like_regex(p, *escape_char)?),
                _ => None,
            };
            Ok(Expression::Like {
                expr: bind_boxed(inner)?,
                pattern: Box::new(pattern),
                escape: *escape_char,
                negated: *negated,
                compiled,
            })
        }
        Expr::Cast { expr: inner, data_type, .. } => Ok(Expression::Cast {
            expr: bind_boxed(inner)?,
            target: cast_target(data_type)?,
        }),
        Expr::Extract { field, expr: inner } => {
            let part = match field {
                DateTimeField::Year => DatePart::Year,
                DateTimeField::Month => DatePart::Month,
                DateTimeField::Day => DatePart::Day,
                other => bail!("EXTRACT({}) is not supported; use YEAR, MONTH or DAY", other),
            };
            Ok(Expression::Extract { part, expr: bind_boxed(inner)? })
        }
        Expr::Substring { expr: inner, substring_from, substring_for, .. } => {
            let mut args = vec![bind(inner)?];
            args.push(match substring_from {
                Some(from) => bind(from)?,
                None => Expression::Literal(Value::Int64(1)),
            });
            if let Some(len) = substring_for {
                args.push(bind(len)?);
            }
            Ok(Expression::Function { name: "SUBSTR".to_string(), args })
        }
        Expr::Trim { expr: inner, trim_where, trim_what, .. } => {
            if trim_what.is_some() {
                bail!("TRIM with explicit characters is not supported");
            }
            let name = match trim_where {
                Some(TrimWhereField::Leading) => "LTRIM",
                Some(TrimWhereField::Trailing) => "RTRIM",
                _ => "TRIM",
            };
            Ok(Expression::Function { name: name.to_string(), args: vec![bind(inner)?] })
        }
        Expr::Case { operand, conditions, results, else_result } => {
            // sqlparser keeps WHEN and THEN lists side by side
            let condition_pairs = conditions
                .iter()
                .zip(results.iter())
                .map(|(condition, result)| Ok((bind(condition)?, bind(result)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Expression::Case {
                operand: operand.as_deref().map(bind_boxed).transpose()?,
                conditions: condition_pairs,
                else_result: else_result.as_deref().map(bind_boxed).transpose()?,
            })
        }
        Expr::Function(func) => function_call(func, resolver),
        Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => {
            bail!("Subqueries are not supported")
        }
        _ => bail!("Unsupported expression: {}", expr),
    }
}

fn negate(expr: Expression) -> Expression {
    Expression::UnaryOp {
        op: crate::query::expression::UnaryOperator::Not,
        expr: Box::new(expr),
    }
}

fn function_call(func: &Function, resolver: &ColumnResolver) -> Result<Expression> {
    let name = func.name.to_string().to_uppercase();
    if func.over.is_some() {
        bail!("Window functions are not supported: {}", name);
    }
    if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
        bail!(
            "Aggregate function {} is not supported: the query must return candidate rows",
            name
        );
    }
    let Some((min_args, max_args)) = function_arity(&name) else {
        bail!("Unknown function: {}", name);
    };

    let mut args = Vec::with_capacity(func.args.len());
    for arg in &func.args {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
            | FunctionArg::Named { arg: FunctionArgExpr::Expr(expr), .. } => {
                args.push(sql_expr_to_expression(expr, resolver)?);
            }
            _ => bail!("Wildcard arguments are not supported in {}", name),
        }
    }
    if args.len() < min_args || args.len() > max_args {
        bail!("{} called with {} arguments", name, args.len());
    }
    Ok(Expression::Function { name, args })
}

fn literal_value(val: &sqlparser::ast::Value) -> Result<Value> {
    use sqlparser::ast::Value as SqlValue;
    Ok(match val {
        SqlValue::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Value::Int64(i)
            } else if let Ok(f) = n.parse::<f64>() {
                Value::Float64(f)
            } else {
                bail!("Invalid numeric literal: {}", n)
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Value::String(s.clone()),
        SqlValue::Boolean(b) => Value::Bool(*b),
        SqlValue::Null => Value::Null,
        other => bail!("Unsupported literal: {}", other),
    })
}

fn cast_target(data_type: &DataType) -> Result<CastType> {
    let name = data_type.to_string().to_uppercase();
    let target = if name.starts_with("DATETIME") || name.starts_with("TIMESTAMP") {
        CastType::DateTime
    } else if name.starts_with("DATE") {
        CastType::Date
    } else if name.contains("INT") {
        CastType::Integer
    } else if ["REAL", "FLOAT", "DOUBLE", "DECIMAL", "NUMERIC"].iter().any(|t| name.starts_with(t)) {
        CastType::Real
    } else if ["TEXT", "VARCHAR", "CHAR", "STRING", "CHARACTER"].iter().any(|t| name.starts_with(t)) {
        CastType::Text
    } else if name.starts_with("BOOL") {
        CastType::Boolean
    } else {
        bail!("Unsupported CAST target type: {}", data_type)
    };
    Ok(target)
}
