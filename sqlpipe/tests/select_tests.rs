//! Read-only pipelines: filter, group, having, order and projection

#[path = "testutils/mod.rs"]
mod testutils;

use sqlpipe::expr::Expr;
use sqlpipe::plan::{ProjectedColumn, SelectPlan, SortKey};
use sqlpipe::{ExecutionError, PlanNode, Value};
use testutils::plans::*;
use testutils::test_fixture::{column_strings, TestFixture, ORDERS};

fn grouped_orders() -> Vec<PlanNode> {
    vec![
        scan(ORDERS),
        group_by(
            vec![Expr::col("user_id")],
            vec![
                (Expr::col("user_id"), "user_id"),
                (count_star(), "count"),
                (agg("avg", "price"), "avg_price"),
            ],
        ),
    ]
}

#[tokio::test]
async fn test_where_on_derived_column() {
    let fixture = TestFixture::with_orders();
    let plan = select(vec![
        scan(ORDERS),
        project(vec![
            ProjectedColumn::star(),
            ProjectedColumn::new(Expr::col("price").gt(Expr::lit(30)), "expensive"),
        ]),
        where_(Expr::col("expensive").equals(Expr::lit(true))),
    ]);

    let result = fixture.assert_plan_succeeds(&plan).await;
    assert_eq!(result.len(), 1);
    assert_eq!(result.rows[0].get_value("order_id"), Some(&Value::Int(2)));
    assert_eq!(result.rows[0].get_value("expensive"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_group_by_count_and_avg() {
    let fixture = TestFixture::with_orders();
    let result = fixture
        .assert_plan_succeeds(&select(grouped_orders()))
        .await;
    assert_eq!(result.len(), 2);

    let x = result
        .rows
        .iter()
        .find(|row| row.get_value("user_id") == Some(&Value::from("x")))
        .expect("user x missing");
    assert_eq!(x.get_value("count"), Some(&Value::Int(2)));
    assert_eq!(x.get_value("avg_price"), Some(&Value::Number(30.0)));

    let y = result
        .rows
        .iter()
        .find(|row| row.get_value("user_id") == Some(&Value::from("y")))
        .expect("user y missing");
    assert_eq!(y.get_value("count"), Some(&Value::Int(1)));
    assert_eq!(y.get_value("avg_price"), Some(&Value::Number(10.0)));
}

#[tokio::test]
async fn test_having_filters_groups() {
    let fixture = TestFixture::with_orders();
    let mut children = grouped_orders();
    children.push(having(Expr::col("count").gt(Expr::lit(1))));

    let result = fixture.assert_plan_succeeds(&select(children)).await;
    assert_eq!(result.len(), 1);
    assert_eq!(column_strings(&result, "user_id"), vec!["x"]);
}

#[tokio::test]
async fn test_order_and_final_projection() {
    let fixture = TestFixture::with_orders();
    let plan = select(vec![
        scan(ORDERS),
        order(vec![SortKey::desc(Expr::col("user_id")), SortKey::asc(Expr::col("price"))]),
        final_project(vec![
            ProjectedColumn::new(Expr::col("order_id"), "id"),
            ProjectedColumn::new(Expr::col("price"), "price"),
        ]),
    ]);

    let result = fixture.assert_plan_succeeds(&plan).await;
    assert_eq!(result.columns, vec!["id".to_string(), "price".to_string()]);
    assert_eq!(column_strings(&result, "id"), vec!["3", "1", "2"]);
    // final projection numbers its rows
    let ids: Vec<u64> = result.rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_order_is_lexical() {
    let mut fixture = TestFixture::new();
    let table = fixture.create_table("numbers", &["n"], None);
    for n in [9, 10, 2] {
        table.insert_row(vec![Value::Int(n)]).unwrap();
    }
    let plan = select(vec![scan("numbers"), order(vec![SortKey::asc(Expr::col("n"))])]);

    let result = fixture.assert_plan_succeeds(&plan).await;
    assert_eq!(column_strings(&result, "n"), vec!["10", "2", "9"]);
}

#[tokio::test]
async fn test_guarded_projection_omits_column() {
    let fixture = TestFixture::with_orders();
    let plan = select(vec![
        scan(ORDERS),
        final_project(vec![
            ProjectedColumn::new(Expr::col("order_id"), "id"),
            ProjectedColumn::new(Expr::col("price"), "big_price")
                .with_guard(Expr::col("price").gt(Expr::lit(15))),
        ]),
    ]);

    let result = fixture.assert_plan_succeeds(&plan).await;
    assert_eq!(result.len(), 3);
    let with_price = result
        .rows
        .iter()
        .filter(|row| row.get_value("big_price").is_some())
        .count();
    assert_eq!(with_price, 2);
}

#[tokio::test]
async fn test_parallel_select_returns_every_branch() {
    let fixture = TestFixture::with_orders();
    let plan = PlanNode::Select(SelectPlan::parallel(vec![
        select(vec![scan(ORDERS), where_(Expr::col("user_id").equals(Expr::lit("x")))]),
        select(vec![scan(ORDERS), where_(Expr::col("user_id").equals(Expr::lit("y")))]),
    ]));

    let result = fixture.assert_plan_succeeds(&plan).await;
    assert_eq!(result.len(), 3);
    assert_eq!(fixture.table(ORDERS).open_connections(), 0);
}

#[tokio::test]
async fn test_plan_from_json() {
    let fixture = TestFixture::with_orders();
    let plan = PlanNode::from_json(
        r#"{
            "node": "select",
            "children": [
                {"node": "source", "table": "orders"},
                {"node": "where", "predicate": {"Binary": {
                    "op": "Eq",
                    "left": {"Column": "user_id"},
                    "right": {"Literal": {"String": "x"}}
                }}},
                {"node": "projection", "final_projection": true, "columns": [
                    {"expr": {"Column": "price"}, "alias": "price"}
                ]}
            ]
        }"#,
    )
    .expect("Failed to parse plan");

    let result = fixture.assert_plan_succeeds(&plan).await;
    let mut prices = column_strings(&result, "price");
    prices.sort();
    assert_eq!(prices, vec!["20", "40"]);
}

#[tokio::test]
async fn test_unknown_table() {
    let fixture = TestFixture::with_orders();
    let err = fixture
        .assert_plan_fails(&select(vec![scan("nope")]))
        .await;
    assert!(matches!(err, ExecutionError::StorageError(_)));
    assert!(err.to_string().contains("nope"));
}

#[tokio::test]
async fn test_empty_table() {
    let mut fixture = TestFixture::new();
    fixture.create_table("empty", &["a"], None);
    let plan = select(vec![
        scan("empty"),
        group_by(vec![Expr::col("a")], vec![(count_star(), "count")]),
    ]);
    let result = fixture.assert_plan_succeeds(&plan).await;
    assert!(result.is_empty());
}
