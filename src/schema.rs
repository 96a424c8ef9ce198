use crate::model::{CUSTOMERS, PRODUCTS, TRANSACTIONS};
use crate::sqlite::{DataType, ForeignKey, IndexDefinition, Schema, TableDefinition};

/// The customer and product dimensions plus the sales fact table.
///
/// Dimension rows are versioned, so `ID` is not unique and carries no key.
pub fn sales_schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new(CUSTOMERS)
                .column("ID", DataType::Integer)
                .column("address", DataType::Text)
                .column("age", DataType::Integer)
                .column("start_date", DataType::Date)
                .column("end_date", DataType::Date)
                .column("current", DataType::Boolean),
        )
        .add_table(
            TableDefinition::new(PRODUCTS)
                .column("ID", DataType::Integer)
                .column("name", DataType::Text)
                .column("price", DataType::Numeric)
                .column("start_date", DataType::Date)
                .column("end_date", DataType::Date)
                .column("current", DataType::Boolean),
        )
        .add_table(
            TableDefinition::new(TRANSACTIONS)
                .column("ID", DataType::Integer)
                .column("product", DataType::Integer)
                .column("customer", DataType::Integer)
                .column("quantity", DataType::Integer)
                .column("order_date", DataType::Date)
                .foreign_key(ForeignKey::new("product", PRODUCTS, "ID"))
                .foreign_key(ForeignKey::new("customer", CUSTOMERS, "ID"))
                .index(IndexDefinition::new("idx_transactions_customer", &["customer"]))
                .index(IndexDefinition::new("idx_transactions_product", &["product"])),
        )
}
