use std::io::{BufRead, Write};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::CUSTOMERS;
use crate::sqlite::{
    CrudOperation, Query, QueryOperator, QueryResult, ReadOperation, SqlQuery, SqliteStore, Value,
};

/// A titled query printed as a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: &'static str,
    pub query: SqlQuery,
}

// Prices an order with the product version valid on its order date.
const PRICED_AT_ORDER_DATE: &str = "p.ID = t.product
        AND p.start_date <= t.order_date
        AND (p.end_date IS NULL OR t.order_date < p.end_date)";

const REVENUE_BY_PRODUCT: &str = "SELECT p.ID AS product_id,
       p.name AS product,
       SUM(t.quantity) AS units,
       ROUND(SUM(t.quantity * p.price), 2) AS revenue
  FROM transactions t
  JOIN products p ON {priced}
 GROUP BY p.ID, p.name
 ORDER BY revenue DESC, product_id";

const TOP_CUSTOMERS: &str = "SELECT t.customer AS customer_id,
       (SELECT c.address FROM customers c
         WHERE c.ID = t.customer
         ORDER BY c.\"current\" DESC, c.start_date DESC
         LIMIT 1) AS address,
       COUNT(*) AS orders,
       ROUND(SUM(t.quantity * p.price), 2) AS spend
  FROM transactions t
  JOIN products p ON {priced}
 GROUP BY t.customer
 ORDER BY spend DESC, customer_id
 LIMIT :limit";

const MONTHLY_SALES: &str = "SELECT strftime('%Y-%m', t.order_date) AS month,
       COUNT(*) AS orders,
       SUM(t.quantity) AS units,
       ROUND(SUM(t.quantity * p.price), 2) AS revenue
  FROM transactions t
  LEFT JOIN products p ON {priced}
 GROUP BY month
 ORDER BY month";

const SALES_BY_AGE_BAND: &str = "SELECT CASE
         WHEN c.age IS NULL THEN 'unknown'
         WHEN c.age < 25 THEN '<25'
         WHEN c.age < 35 THEN '25-34'
         WHEN c.age < 45 THEN '35-44'
         WHEN c.age < 55 THEN '45-54'
         ELSE '55+'
       END AS age_band,
       COUNT(DISTINCT t.customer) AS customers,
       COUNT(*) AS orders,
       SUM(t.quantity) AS units
  FROM transactions t
  LEFT JOIN customers c
    ON c.ID = t.customer
   AND c.start_date <= t.order_date
   AND (c.end_date IS NULL OR t.order_date < c.end_date)
 GROUP BY age_band
 ORDER BY MIN(COALESCE(c.age, 1000))";

const CURRENT_CATALOGUE: &str = "SELECT p.ID AS product_id,
       p.name AS product,
       CAST(p.price AS REAL) AS price,
       COALESCE(SUM(t.quantity), 0) AS units_sold,
       COUNT(DISTINCT t.customer) AS buyers
  FROM products p
  LEFT JOIN transactions t ON t.product = p.ID
 WHERE p.\"current\" = 1
 GROUP BY p.ID, p.name, p.price
 ORDER BY units_sold DESC, product_id";

/// The five fixed reports; `top` bounds the customer ranking.
pub fn standard_reports(top: u32) -> Vec<Report> {
    let priced = |sql: &str| sql.replace("{priced}", PRICED_AT_ORDER_DATE);
    vec![
        Report {
            title: "Revenue by product",
            query: SqlQuery::new(&priced(REVENUE_BY_PRODUCT)),
        },
        Report {
            title: "Top customers by spend",
            query: SqlQuery::new(&priced(TOP_CUSTOMERS)).with_value("limit", i64::from(top)),
        },
        Report {
            title: "Monthly sales",
            query: SqlQuery::new(&priced(MONTHLY_SALES)),
        },
        Report {
            title: "Sales by customer age band",
            query: SqlQuery::new(SALES_BY_AGE_BAND),
        },
        Report {
            title: "Current product catalogue",
            query: SqlQuery::new(CURRENT_CATALOGUE),
        },
    ]
}

/// Run each report in order and print it to `out`.
pub fn run_reports<W: Write>(
    store: &SqliteStore,
    reports: &[Report],
    out: &mut W,
) -> Result<Vec<QueryResult>> {
    let mut results = Vec::with_capacity(reports.len());
    for report in reports {
        debug!(title = report.title, "running report");
        let result = store.query(&report.query)?;
        info!(title = report.title, rows = result.len(), "report finished");
        render_table(out, report.title, &result)?;
        results.push(result);
    }
    Ok(results)
}

/// Every customer version whose address contains `needle`, case-insensitively.
pub fn lookup_by_address(store: &SqliteStore, needle: &str) -> Result<QueryResult> {
    let read = ReadOperation::new(
        CUSTOMERS,
        Query::new().with_condition("address", QueryOperator::contains(needle)),
    )
    .with_order("ID", true)
    .with_order("start_date", true);
    let result = store.execute_crud(&CrudOperation::Read(read))?.into_rows();
    info!(needle, matches = result.len(), "address lookup");
    Ok(result)
}

/// Ask for an address fragment. Blank input or end of input yields `None`.
pub fn prompt_address<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Option<String>> {
    write!(output, "Search customers by address (blank to skip): ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let needle = line.trim();
    Ok((!needle.is_empty()).then(|| needle.to_string()))
}

/// Print `result` as an aligned text table under `title`.
pub fn render_table<W: Write>(out: &mut W, title: &str, result: &QueryResult) -> Result<()> {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    // a column is right-aligned when every non-NULL value in it is a number
    let numeric: Vec<bool> = (0..result.columns.len())
        .map(|idx| {
            let mut present = result
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|value| **value != Value::Null)
                .peekable();
            present.peek().is_some() && present.all(Value::is_numeric)
        })
        .collect();
    let align = |text: &str, width: usize, right: bool| {
        if right {
            format!("{text:>width$}")
        } else {
            format!("{text:<width$}")
        }
    };

    writeln!(out, "== {title} ==")?;
    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .zip(&numeric)
        .map(|((name, width), right)| align(name.as_str(), *width, *right))
        .collect();
    writeln!(out, "{}", header.join(" | ").trim_end())?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("-+-"))?;

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .zip(&numeric)
            .map(|((cell, width), right)| align(cell.as_str(), *width, *right))
            .collect();
        writeln!(out, "{}", line.join(" | ").trim_end())?;
    }
    let noun = if result.len() == 1 { "row" } else { "rows" };
    writeln!(out, "({} {noun})\n", result.len())?;
    Ok(())
}
