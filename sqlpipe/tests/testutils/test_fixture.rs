//! Test fixture for sqlpipe integration tests
//!
//! Uses only the public API: a `MemoryDatabase`, a `SourceRegistry` and the
//! `Executor`.

use sqlpipe::exec::ExecutionError;
use sqlpipe::storage::{MemoryTable, TableCapabilities};
use sqlpipe::{EngineConfig, Executor, MemoryDatabase, PlanNode, QueryResult, SourceRegistry, Value};
use std::sync::Arc;

pub const ORDERS: &str = "orders";

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Isolated in-memory database
pub struct TestFixture {
    pub db: Arc<MemoryDatabase>,
    pub registry: SourceRegistry,
    pub config: EngineConfig,
}

impl TestFixture {
    /// Create empty test fixture
    pub fn new() -> Self {
        init_logging();
        Self {
            db: MemoryDatabase::new(),
            registry: SourceRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    /// Fixture with an `orders(order_id, user_id, price)` table:
    /// two orders for user x (20, 40) and one for user y (10)
    pub fn with_orders() -> Self {
        let mut fixture = Self::new();
        let orders = fixture.create_table(ORDERS, &["order_id", "user_id", "price"], Some("order_id"));
        for (id, user, price) in [(1, "x", 20), (2, "x", 40), (3, "y", 10)] {
            orders
                .insert_row(vec![Value::Int(id), Value::from(user), Value::Int(price)])
                .expect("Failed to seed orders");
        }
        fixture
    }

    /// Create a table with every capability and register it
    pub fn create_table(
        &mut self,
        name: &str,
        columns: &[&str],
        primary_key: Option<&str>,
    ) -> Arc<MemoryTable> {
        self.create_table_with(name, columns, primary_key, TableCapabilities::all())
    }

    pub fn create_table_with(
        &mut self,
        name: &str,
        columns: &[&str],
        primary_key: Option<&str>,
        capabilities: TableCapabilities,
    ) -> Arc<MemoryTable> {
        let table = self
            .db
            .create_table_with(name, columns, primary_key, capabilities)
            .expect("Failed to create table");
        self.db.register_all(&mut self.registry);
        table
    }

    pub fn table(&self, name: &str) -> Arc<MemoryTable> {
        self.db
            .table(name)
            .unwrap_or_else(|| panic!("Table '{}' not found", name))
    }

    pub fn build(&self, plan: &PlanNode) -> Result<Executor, ExecutionError> {
        Executor::build(plan, &self.registry, self.config.clone())
    }

    /// Build and execute a plan
    pub async fn execute(&self, plan: &PlanNode) -> Result<QueryResult, ExecutionError> {
        self.build(plan)?.execute().await
    }

    /// Execute plan and assert success
    pub async fn assert_plan_succeeds(&self, plan: &PlanNode) -> QueryResult {
        self.execute(plan)
            .await
            .unwrap_or_else(|e| panic!("Plan failed: {:?}\nError: {}", plan.kind(), e))
    }

    /// Execute plan and assert failure
    pub async fn assert_plan_fails(&self, plan: &PlanNode) -> ExecutionError {
        match self.execute(plan).await {
            Ok(result) => panic!("Plan should have failed, returned {} rows", result.len()),
            Err(e) => e,
        }
    }

    /// Execute a mutation and assert it reported `ok`
    pub async fn assert_mutation_ok(&self, plan: &PlanNode) -> u64 {
        let result = self.assert_plan_succeeds(plan).await;
        let summary = result.mutation.expect("Mutation returned no summary");
        assert!(summary.is_ok(), "Mutation status: {}", summary.status);
        summary.affected
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Values of `column` across rows, rendered as sort-key strings
pub fn column_strings(result: &QueryResult, column: &str) -> Vec<String> {
    result
        .column_values(column)
        .into_iter()
        .map(Value::to_key_string)
        .collect()
}
