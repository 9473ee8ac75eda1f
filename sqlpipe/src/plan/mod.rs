// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical plan nodes handed to the executor
//!
//! The planner resolves names and types; by the time a tree reaches the
//! executor every node carries the column lists it needs. The executor walks
//! the tree once and builds one task per node.

use crate::exec::error::ExecutionError;
use crate::expr::Expr;
use serde::{Deserialize, Serialize};

/// Plan tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum PlanNode {
    /// Chain of children (or independent siblings when `parallel` is set)
    Select(SelectPlan),
    Source(SourcePlan),
    Where(FilterPlan),
    /// Same operator as `Where`, placed after a group by
    Having(FilterPlan),
    GroupBy(GroupByPlan),
    Order(OrderPlan),
    Projection(ProjectionPlan),
    JoinKey(JoinKeyPlan),
    JoinMerge(JoinMergePlan),
    Insert(InsertPlan),
    Update(UpdatePlan),
    Upsert(InsertPlan),
    Delete(DeletePlan),
}

impl PlanNode {
    /// Parse a plan tree from its JSON form
    pub fn from_json(json: &str) -> Result<Self, ExecutionError> {
        serde_json::from_str(json).map_err(|e| ExecutionError::InvalidPlan(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ExecutionError> {
        serde_json::to_string(self).map_err(|e| ExecutionError::InvalidPlan(e.to_string()))
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Select(select) => select.children.iter().collect(),
            PlanNode::JoinMerge(join) => vec![join.left.as_ref(), join.right.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Whether children run side by side instead of being chained
    pub fn is_parallel(&self) -> bool {
        match self {
            PlanNode::Select(select) => select.parallel,
            PlanNode::JoinMerge(_) => true,
            _ => false,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            PlanNode::Insert(_) | PlanNode::Update(_) | PlanNode::Upsert(_) | PlanNode::Delete(_)
        )
    }

    /// Short operator name used in task names and log lines
    pub fn kind(&self) -> &'static str {
        match self {
            PlanNode::Select(select) if select.parallel => "parallel",
            PlanNode::Select(_) => "sequential",
            PlanNode::Source(_) => "source",
            PlanNode::Where(_) => "where",
            PlanNode::Having(_) => "having",
            PlanNode::GroupBy(_) => "group_by",
            PlanNode::Order(_) => "order",
            PlanNode::Projection(p) if p.final_projection => "final_projection",
            PlanNode::Projection(_) => "projection",
            PlanNode::JoinKey(_) => "join_key",
            PlanNode::JoinMerge(_) => "join_merge",
            PlanNode::Insert(_) => "insert",
            PlanNode::Update(_) => "update",
            PlanNode::Upsert(_) => "upsert",
            PlanNode::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectPlan {
    pub children: Vec<PlanNode>,
    #[serde(default)]
    pub parallel: bool,
}

impl SelectPlan {
    pub fn sequential(children: Vec<PlanNode>) -> Self {
        Self {
            children,
            parallel: false,
        }
    }

    pub fn parallel(children: Vec<PlanNode>) -> Self {
        Self {
            children,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePlan {
    pub table: String,
}

/// Where / Having
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPlan {
    pub predicate: Expr,
    /// Names for positional input messages
    #[serde(default)]
    pub input_columns: Vec<String>,
}

/// Output column of a group by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub expr: Expr,
    pub alias: String,
}

impl OutputColumn {
    pub fn new(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: alias.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByPlan {
    pub group_by: Vec<Expr>,
    pub columns: Vec<OutputColumn>,
    /// Emit `(count, sum)` pairs instead of final aggregate values
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub input_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub keys: Vec<SortKey>,
    #[serde(default)]
    pub input_columns: Vec<String>,
}

/// Projected column; the column is left out of a row whose guard is not true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedColumn {
    pub expr: Expr,
    pub alias: String,
    #[serde(default)]
    pub guard: Option<Expr>,
}

impl ProjectedColumn {
    pub fn new(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: alias.into(),
            guard: None,
        }
    }

    /// `*`, expanded to every input column
    pub fn star() -> Self {
        Self::new(Expr::Star, "*")
    }

    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = Some(guard);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPlan {
    pub columns: Vec<ProjectedColumn>,
    /// Last operator of the statement: fresh ids, no join key
    #[serde(default)]
    pub final_projection: bool,
    #[serde(default)]
    pub input_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinKeyPlan {
    pub keys: Vec<Expr>,
    #[serde(default)]
    pub input_columns: Vec<String>,
}

/// Copies one input column of a join side into an output position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinColumn {
    pub source: String,
    pub position: usize,
}

impl JoinColumn {
    pub fn new(source: impl Into<String>, position: usize) -> Self {
        Self {
            source: source.into(),
            position,
        }
    }
}

/// Inner equi-join of two keyed inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMergePlan {
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub left_columns: Vec<JoinColumn>,
    pub right_columns: Vec<JoinColumn>,
    pub output_columns: Vec<String>,
}

/// Insert and upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertPlan {
    pub table: String,
    /// Target columns; empty means every table column in order
    #[serde(default)]
    pub columns: Vec<String>,
    /// Row tuples of literal values or constant expressions
    pub rows: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub table: String,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub where_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePlan {
    pub table: String,
    #[serde(default)]
    pub where_expr: Option<Expr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_orders() -> PlanNode {
        PlanNode::Select(SelectPlan::sequential(vec![
            PlanNode::Source(SourcePlan {
                table: "orders".to_string(),
            }),
            PlanNode::Where(FilterPlan {
                predicate: Expr::col("price").gt(Expr::lit(10)),
                input_columns: vec![],
            }),
        ]))
    }

    #[test]
    fn test_children_and_parallel() {
        let plan = scan_orders();
        assert_eq!(plan.children().len(), 2);
        assert!(!plan.is_parallel());
        assert_eq!(plan.kind(), "sequential");

        let join = PlanNode::JoinMerge(JoinMergePlan {
            left: Box::new(scan_orders()),
            right: Box::new(scan_orders()),
            left_columns: vec![],
            right_columns: vec![],
            output_columns: vec![],
        });
        assert!(join.is_parallel());
        assert_eq!(join.children().len(), 2);
    }

    #[test]
    fn test_json_round_trip() {
        let plan = scan_orders();
        let json = plan.to_json().unwrap();
        assert!(json.contains("\"node\":\"select\""));
        assert_eq!(PlanNode::from_json(&json).unwrap(), plan);
    }

    #[test]
    fn test_from_json_defaults() {
        let plan = PlanNode::from_json(
            r#"{"node": "delete", "table": "orders"}"#,
        )
        .unwrap();
        assert!(plan.is_mutation());
        assert_eq!(
            plan,
            PlanNode::Delete(DeletePlan {
                table: "orders".to_string(),
                where_expr: None
            })
        );
        assert!(PlanNode::from_json(r#"{"node": "bogus"}"#).is_err());
    }
}
