pub mod parser;
pub mod planner;
pub mod expression;
pub mod ast_to_expression;
pub mod column_resolver;
pub mod executor;

pub use executor::{FilteredResult, QueryExecutor};
pub use expression::{Expression, ExpressionEvaluator};
pub use planner::{QueryPlanner, SelectPlan};
