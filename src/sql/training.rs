use serde::{Deserialize, Serialize};

use super::SqlExecutor;

/// A question paired with the SQL that answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub question: String,
    pub sql: String,
}

/// Everything the generator knows about the target database.
#[derive(Debug, Clone, Default)]
pub struct TrainingCorpus {
    pub ddl: Vec<String>,
    pub documentation: Vec<String>,
    pub examples: Vec<TrainingExample>,
}

/// Builds one `CREATE TABLE` statement per base table in the public schema.
const SCHEMA_DDL_QUERY: &str = "SELECT
    'CREATE TABLE ' || c.table_name || ' (' ||
    string_agg(
        c.column_name || ' ' || c.data_type ||
        CASE WHEN c.character_maximum_length IS NOT NULL
        THEN '(' || c.character_maximum_length || ')'
        ELSE '' END,
        ', ' ORDER BY c.ordinal_position
    ) || ');' AS ddl
FROM information_schema.columns c
JOIN information_schema.tables t
    ON t.table_name = c.table_name AND t.table_schema = c.table_schema
WHERE c.table_schema = 'public'
  AND t.table_type = 'BASE TABLE'
GROUP BY c.table_name
ORDER BY c.table_name";

pub const ECOMMERCE_DOCUMENTATION: &str = "\
This is an e-commerce database with three main tables:
- customers: Contains customer information including name, email, segment (SMB, Enterprise, Individual), and country
- products: Product catalog with name, category, price, stock quantity, and description
- orders: Customer orders with order date, total amount, status (Pending, Delivered, Cancelled, Processing), and shipping address

The customers table has a one-to-many relationship with orders (one customer can have many orders).
Use customer_order_summary view for aggregated customer statistics.";

/// Read the public schema as DDL statements.
pub async fn introspect_schema(executor: &dyn SqlExecutor) -> anyhow::Result<Vec<String>> {
    let rows = executor.execute(SCHEMA_DDL_QUERY).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.get("ddl").and_then(|v| v.as_str()).map(str::to_string))
        .collect())
}

/// Reference question/SQL pairs for the e-commerce schema.
pub fn golden_examples() -> Vec<TrainingExample> {
    [
        (
            "How many customers do we have?",
            "SELECT COUNT(*) as customer_count FROM customers;",
        ),
        (
            "What is the total revenue from all orders?",
            "SELECT SUM(total_amount) as total_revenue FROM orders;",
        ),
        (
            "List all delivered orders",
            "SELECT * FROM orders WHERE status = 'Delivered' ORDER BY order_date DESC;",
        ),
        (
            "How many orders per customer segment?",
            "SELECT c.segment, COUNT(o.id) as order_count \
             FROM customers c \
             LEFT JOIN orders o ON c.id = o.customer_id \
             GROUP BY c.segment;",
        ),
        (
            "What is the average order value by customer segment?",
            "SELECT c.segment, AVG(o.total_amount) as avg_order_value \
             FROM customers c \
             JOIN orders o ON c.id = o.customer_id \
             GROUP BY c.segment;",
        ),
        (
            "Top 10 customers by total spending",
            "SELECT c.name, c.email, SUM(o.total_amount) as total_spent \
             FROM customers c \
             JOIN orders o ON c.id = o.customer_id \
             GROUP BY c.id, c.name, c.email \
             ORDER BY total_spent DESC \
             LIMIT 10;",
        ),
        (
            "How many products in each category?",
            "SELECT category, COUNT(*) as product_count FROM products GROUP BY category;",
        ),
        (
            "What are the top selling product categories?",
            "SELECT p.category, COUNT(DISTINCT o.id) as order_count \
             FROM products p \
             JOIN orders o ON o.created_at > p.created_at \
             GROUP BY p.category \
             ORDER BY order_count DESC;",
        ),
        (
            "Show orders from the last 30 days",
            "SELECT * FROM orders \
             WHERE order_date >= CURRENT_DATE - INTERVAL '30 days' \
             ORDER BY order_date DESC;",
        ),
        (
            "Which customers have never placed an order?",
            "SELECT c.* FROM customers c \
             LEFT JOIN orders o ON c.id = o.customer_id \
             WHERE o.id IS NULL;",
        ),
    ]
    .into_iter()
    .map(|(question, sql)| TrainingExample {
        question: question.to_string(),
        sql: sql.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Row;
    use async_trait::async_trait;

    struct SchemaExecutor;

    #[async_trait]
    impl SqlExecutor for SchemaExecutor {
        async fn execute(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
            assert!(sql.contains("information_schema.columns"));
            let rows = [
                "CREATE TABLE customers (id integer, name character varying(255));",
                "CREATE TABLE orders (id integer, total_amount numeric);",
            ]
            .iter()
            .map(|ddl| {
                let mut row = Row::new();
                row.insert("ddl".to_string(), serde_json::json!(ddl));
                row
            })
            .collect();
            Ok(rows)
        }
    }

    #[tokio::test]
    async fn test_introspect_schema_collects_ddl() {
        let ddl = introspect_schema(&SchemaExecutor).await.unwrap();
        assert_eq!(ddl.len(), 2);
        assert!(ddl[0].starts_with("CREATE TABLE customers"));
    }

    #[test]
    fn test_golden_examples() {
        let examples = golden_examples();
        assert_eq!(examples.len(), 10);
        assert_eq!(examples[0].question, "How many customers do we have?");
        assert!(examples.iter().all(|e| e.sql.trim_end().ends_with(';')));
    }
}
