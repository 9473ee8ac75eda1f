//! Plan builders for the shapes a planner emits

use sqlpipe::expr::Expr;
use sqlpipe::plan::{
    Assignment, DeletePlan, FilterPlan, GroupByPlan, InsertPlan, JoinColumn, JoinKeyPlan,
    JoinMergePlan, OrderPlan, OutputColumn, ProjectedColumn, ProjectionPlan, SelectPlan, SortKey,
    SourcePlan, UpdatePlan,
};
use sqlpipe::PlanNode;

pub fn select(children: Vec<PlanNode>) -> PlanNode {
    PlanNode::Select(SelectPlan::sequential(children))
}

pub fn scan(table: &str) -> PlanNode {
    PlanNode::Source(SourcePlan {
        table: table.to_string(),
    })
}

pub fn where_(predicate: Expr) -> PlanNode {
    PlanNode::Where(FilterPlan {
        predicate,
        input_columns: vec![],
    })
}

pub fn having(predicate: Expr) -> PlanNode {
    PlanNode::Having(FilterPlan {
        predicate,
        input_columns: vec![],
    })
}

pub fn group_by(keys: Vec<Expr>, columns: Vec<(Expr, &str)>) -> PlanNode {
    PlanNode::GroupBy(GroupByPlan {
        group_by: keys,
        columns: columns
            .into_iter()
            .map(|(expr, alias)| OutputColumn::new(expr, alias))
            .collect(),
        partial: false,
        input_columns: vec![],
    })
}

pub fn order(keys: Vec<SortKey>) -> PlanNode {
    PlanNode::Order(OrderPlan {
        keys,
        input_columns: vec![],
    })
}

/// In-process projection: keeps ids and join keys
pub fn project(columns: Vec<ProjectedColumn>) -> PlanNode {
    PlanNode::Projection(ProjectionPlan {
        columns,
        final_projection: false,
        input_columns: vec![],
    })
}

pub fn final_project(columns: Vec<ProjectedColumn>) -> PlanNode {
    PlanNode::Projection(ProjectionPlan {
        columns,
        final_projection: true,
        input_columns: vec![],
    })
}

pub fn join_key(keys: Vec<Expr>) -> PlanNode {
    PlanNode::JoinKey(JoinKeyPlan {
        keys,
        input_columns: vec![],
    })
}

/// Inner join of two keyed branches; `columns` are `(source, output)` pairs
pub fn join(
    left: PlanNode,
    right: PlanNode,
    left_columns: Vec<(&str, usize)>,
    right_columns: Vec<(&str, usize)>,
    output_columns: &[&str],
) -> PlanNode {
    let convert = |columns: Vec<(&str, usize)>| {
        columns
            .into_iter()
            .map(|(source, position)| JoinColumn::new(source, position))
            .collect()
    };
    PlanNode::JoinMerge(JoinMergePlan {
        left: Box::new(left),
        right: Box::new(right),
        left_columns: convert(left_columns),
        right_columns: convert(right_columns),
        output_columns: output_columns.iter().map(|c| c.to_string()).collect(),
    })
}

pub fn insert(table: &str, columns: &[&str], rows: Vec<Vec<Expr>>) -> PlanNode {
    PlanNode::Insert(insert_plan(table, columns, rows))
}

pub fn upsert(table: &str, columns: &[&str], rows: Vec<Vec<Expr>>) -> PlanNode {
    PlanNode::Upsert(insert_plan(table, columns, rows))
}

fn insert_plan(table: &str, columns: &[&str], rows: Vec<Vec<Expr>>) -> InsertPlan {
    InsertPlan {
        table: table.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

pub fn update(table: &str, assignments: Vec<(&str, Expr)>, where_expr: Option<Expr>) -> PlanNode {
    PlanNode::Update(UpdatePlan {
        table: table.to_string(),
        assignments: assignments
            .into_iter()
            .map(|(column, value)| Assignment::new(column, value))
            .collect(),
        where_expr,
    })
}

pub fn delete(table: &str, where_expr: Option<Expr>) -> PlanNode {
    PlanNode::Delete(DeletePlan {
        table: table.to_string(),
        where_expr,
    })
}

pub fn count_star() -> Expr {
    Expr::func("count", vec![Expr::Star])
}

pub fn agg(name: &str, column: &str) -> Expr {
    Expr::func(name, vec![Expr::col(column)])
}
