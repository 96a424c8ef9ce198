//! Scripted mutations run against a freshly loaded store.

use tracing::info;

use crate::error::{EtlError, Result};
use crate::model::{Customer, Record, Transaction, CUSTOMERS, PRODUCTS, TRANSACTIONS};
use crate::sqlite::{
    CreateOperation, CrudOperation, DeleteOperation, Query, QueryOperator, ReadOperation,
    SqliteStore, Value,
};

struct DemoCustomer {
    address: &'static str,
    age: i64,
    since: &'static str,
    quantity: i64,
}

const DEMO_CUSTOMERS: [DemoCustomer; 2] = [
    DemoCustomer {
        address: "14 Orchard Lane, Bristol",
        age: 29,
        since: "2024-03-01",
        quantity: 2,
    },
    DemoCustomer {
        address: "221 Harbour Street, Glasgow",
        age: 47,
        since: "2024-03-02",
        quantity: 5,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoOutcome {
    pub customer_ids: Vec<i64>,
    pub order_ids: Vec<i64>,
    pub deleted_customer: Option<i64>,
    pub deleted_rows: usize,
}

/// Insert the demo customers with one order each, then delete one customer.
///
/// Without `delete` the last demo customer is removed. Their orders stay behind.
pub fn run_demo(store: &SqliteStore, delete: Option<i64>) -> Result<DemoOutcome> {
    let product = first_current_product(store)?.ok_or(EtlError::NoCurrentProduct)?;

    let mut customer_ids = Vec::with_capacity(DEMO_CUSTOMERS.len());
    let mut order_ids = Vec::with_capacity(DEMO_CUSTOMERS.len());
    for demo in &DEMO_CUSTOMERS {
        let customer = Customer {
            id: store.next_id(CUSTOMERS)?,
            address: demo.address.to_string(),
            age: Some(demo.age),
            start_date: demo.since.to_string(),
            end_date: None,
            current: true,
        };
        insert(store, &customer)?;

        let order = Transaction {
            id: store.next_id(TRANSACTIONS)?,
            product,
            customer: customer.id,
            quantity: demo.quantity,
            order_date: demo.since.to_string(),
        };
        insert(store, &order)?;

        info!(
            customer = customer.id,
            order = order.id,
            product,
            "inserted demo customer with order"
        );
        customer_ids.push(customer.id);
        order_ids.push(order.id);
    }

    let target = delete.or_else(|| customer_ids.last().copied());
    let deleted_rows = match target {
        Some(id) => delete_customer(store, id)?,
        None => 0,
    };

    Ok(DemoOutcome {
        customer_ids,
        order_ids,
        deleted_customer: target,
        deleted_rows,
    })
}

/// Remove every version of customer `id`; returns the number of rows deleted.
pub fn delete_customer(store: &SqliteStore, id: i64) -> Result<usize> {
    let op = CrudOperation::Delete(DeleteOperation::new(
        CUSTOMERS,
        Query::new().with_condition("ID", QueryOperator::Equal(Value::Integer(id))),
    ));
    let deleted = store.execute_crud(&op)?.affected();
    info!(customer = id, rows = deleted, "deleted customer");
    Ok(deleted)
}

fn insert<T: Record>(store: &SqliteStore, record: &T) -> Result<()> {
    let op = CrudOperation::Create(CreateOperation::new(T::TABLE, record.to_params()));
    store.execute_crud(&op)?;
    Ok(())
}

fn first_current_product(store: &SqliteStore) -> Result<Option<i64>> {
    let read = ReadOperation::new(
        PRODUCTS,
        Query::new().with_condition("current", QueryOperator::Equal(Value::Boolean(true))),
    )
    .with_fields(&["ID"])
    .with_order("ID", true)
    .with_limit(1);
    let rows = store.execute_crud(&CrudOperation::Read(read))?.into_rows();
    Ok(rows.get(0, "ID").and_then(Value::as_i64))
}
