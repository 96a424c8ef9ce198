use sales_etl::loader::{read_records, DataFiles, LoadSummary};
use sales_etl::model::{Customer, Product, TRANSACTIONS};
use sales_etl::pipeline::{run, PipelineConfig, PipelineSummary};
use sales_etl::schema::sales_schema;
use sales_etl::sqlite::{QueryResult, SqliteConfig, SqliteStore, Value};
use sales_etl::{EtlError, Result};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const CUSTOMERS_CSV: &str = "\
1,12 High Street Leeds,34,2020-01-01,2022-06-30,0
1,8 Mill Road Leeds,35,2022-06-30,,1
2,5 Station Road York,22,2021-03-15,,1
3,77 Queens Avenue Hull,58,2021-05-01,,True
";

const PRODUCTS_CSV: &str = "\
10,Desk Lamp,20.00,2020-01-01,2023-01-01,0
10,Desk Lamp,25.00,2023-01-01,,1
11,Office Chair,120.5,2020-01-01,,1
12,Notebook,3.00,2020-01-01,2022-01-01,false
";

const TRANSACTIONS_CSV: &str = "\
100,10,1,2,2022-03-10
101,10,2,1,2023-02-01
102,11,1,1,2023-02-15
103,12,3,10,2021-07-04
";

fn write_extracts(dir: &Path) -> DataFiles {
    let files = DataFiles::in_dir(dir);
    fs::write(&files.customers, CUSTOMERS_CSV).unwrap();
    fs::write(&files.products, PRODUCTS_CSV).unwrap();
    fs::write(&files.transactions, TRANSACTIONS_CSV).unwrap();
    files
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        files: write_extracts(dir.path()),
        database: None,
        reset: false,
        run_demo: true,
        delete_customer: None,
        address: None,
        prompt: false,
        top: 5,
    }
}

fn run_quiet(config: &PipelineConfig) -> (PipelineSummary, String) {
    let mut output = Vec::new();
    let summary = run(config, &mut Cursor::new(""), &mut output).unwrap();
    (summary, String::from_utf8(output).unwrap())
}

fn column(result: &QueryResult, name: &str) -> Vec<Value> {
    (0..result.len())
        .map(|row| result.get(row, name).cloned().unwrap())
        .collect()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}

#[test]
fn test_load_counts() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        run_demo: false,
        ..config(&dir)
    };
    let (summary, _) = run_quiet(&config);
    assert_eq!(
        summary.loaded,
        LoadSummary {
            customers: 4,
            products: 4,
            transactions: 4,
        }
    );
    assert!(summary.demo.is_none());
    assert!(summary.lookup.is_none());
}

#[test]
fn test_demo_inserts_and_deletes() {
    let dir = tempdir().unwrap();
    let (summary, _) = run_quiet(&config(&dir));
    let demo = summary.demo.unwrap();
    assert_eq!(demo.customer_ids, vec![4, 5]);
    assert_eq!(demo.order_ids, vec![104, 105]);
    assert_eq!(demo.deleted_customer, Some(5));
    assert_eq!(demo.deleted_rows, 1);
}

#[test]
fn test_delete_chosen_customer() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        delete_customer: Some(1),
        ..config(&dir)
    };
    let (summary, _) = run_quiet(&config);
    let demo = summary.demo.unwrap();
    assert_eq!(demo.deleted_customer, Some(1));
    // both versions of customer 1 go
    assert_eq!(demo.deleted_rows, 2);
}

#[test]
fn test_revenue_uses_price_at_order_date() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        run_demo: false,
        ..config(&dir)
    };
    let (summary, output) = run_quiet(&config);
    let revenue = &summary.reports[0];
    assert_eq!(column(revenue, "product_id"), ints(&[11, 10, 12]));
    let totals: Vec<f64> = column(revenue, "revenue")
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(totals, vec![120.5, 65.0, 30.0]);
    assert!(output.contains("== Revenue by product =="));
}

#[test]
fn test_versions_change_on_their_start_date() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        run_demo: false,
        ..config(&dir)
    };
    // customer 1 moves to its second version on 2022-06-30,
    // product 10 to its second price on 2023-01-01
    fs::write(
        &config.files.transactions,
        "200,10,2,2,2023-01-01\n201,11,1,1,2022-06-30\n",
    )
    .unwrap();
    let (summary, _) = run_quiet(&config);
    let [revenue, _, _, ages, _] = summary.reports.as_slice() else {
        panic!("expected five reports, got {}", summary.reports.len());
    };

    assert_eq!(column(revenue, "product_id"), ints(&[11, 10]));
    assert_eq!(column(revenue, "units"), ints(&[1, 2]));
    assert_eq!(revenue.get(1, "revenue").and_then(Value::as_f64), Some(50.0));

    assert_eq!(
        column(ages, "age_band"),
        vec![Value::from("<25"), Value::from("35-44")]
    );
    assert_eq!(column(ages, "orders"), ints(&[1, 1]));
}

#[test]
fn test_reports_after_demo() {
    let dir = tempdir().unwrap();
    let (summary, output) = run_quiet(&config(&dir));
    let [revenue, top, monthly, ages, catalogue] = summary.reports.as_slice() else {
        panic!("expected five reports, got {}", summary.reports.len());
    };

    assert_eq!(column(revenue, "product_id"), ints(&[10, 11, 12]));
    assert_eq!(revenue.get(0, "units"), Some(&Value::Integer(10)));

    assert_eq!(column(top, "customer_id"), ints(&[1, 5, 4, 3, 2]));
    assert_eq!(top.get(0, "address"), Some(&Value::from("8 Mill Road Leeds")));
    // the deleted demo customer keeps its orders but loses its address
    assert_eq!(top.get(1, "address"), Some(&Value::Null));

    assert_eq!(
        column(monthly, "month"),
        vec![
            Value::from("2021-07"),
            Value::from("2022-03"),
            Value::from("2023-02"),
            Value::from("2024-03"),
        ]
    );
    assert_eq!(column(monthly, "orders"), ints(&[1, 1, 2, 2]));
    assert_eq!(column(monthly, "units"), ints(&[10, 2, 2, 7]));

    assert_eq!(
        column(ages, "age_band"),
        vec![
            Value::from("<25"),
            Value::from("25-34"),
            Value::from("35-44"),
            Value::from("55+"),
            Value::from("unknown"),
        ]
    );
    assert_eq!(column(ages, "customers"), ints(&[1, 2, 1, 1, 1]));
    assert_eq!(column(ages, "units"), ints(&[1, 4, 1, 10, 5]));

    assert_eq!(column(catalogue, "product_id"), ints(&[10, 11]));
    assert_eq!(column(catalogue, "units_sold"), ints(&[10, 1]));
    assert_eq!(column(catalogue, "buyers"), ints(&[4, 1]));
    assert_eq!(catalogue.get(0, "price"), Some(&Value::Real(25.0)));

    for title in [
        "Revenue by product",
        "Top customers by spend",
        "Monthly sales",
        "Sales by customer age band",
        "Current product catalogue",
    ] {
        assert!(output.contains(&format!("== {title} ==")), "missing {title}");
    }
}

#[test]
fn test_top_limit() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        top: 2,
        ..config(&dir)
    };
    let (summary, _) = run_quiet(&config);
    assert_eq!(column(&summary.reports[1], "customer_id"), ints(&[1, 5]));
}

#[test]
fn test_address_lookup_from_config() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        address: Some("leeds".to_string()),
        ..config(&dir)
    };
    let (summary, output) = run_quiet(&config);
    let lookup = summary.lookup.unwrap();
    assert_eq!(
        column(&lookup, "address"),
        vec![
            Value::from("12 High Street Leeds"),
            Value::from("8 Mill Road Leeds"),
        ]
    );
    assert!(output.contains("Customers with address matching \"leeds\""));
}

#[test]
fn test_address_lookup_from_prompt() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        prompt: true,
        ..config(&dir)
    };
    let mut output = Vec::new();
    let summary = run(&config, &mut Cursor::new("road\n"), &mut output).unwrap();
    let lookup = summary.lookup.unwrap();
    assert_eq!(column(&lookup, "ID"), ints(&[1, 2]));
    assert!(String::from_utf8(output)
        .unwrap()
        .starts_with("Search customers by address"));
}

#[test]
fn test_rerun_appends_unless_reset() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sales.sqlite");
    let base = PipelineConfig {
        database: Some(path.clone()),
        run_demo: false,
        ..config(&dir)
    };
    let count = || -> Result<i64> {
        let store = SqliteStore::open(SqliteConfig::new(&path, sales_schema()))?;
        store.count(TRANSACTIONS)
    };

    run_quiet(&base);
    run_quiet(&base);
    assert_eq!(count()?, 8);

    let reset = PipelineConfig {
        reset: true,
        ..base
    };
    run_quiet(&reset);
    assert_eq!(count()?, 4);
    Ok(())
}

#[test]
fn test_missing_extract() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir);
    config.files.products = dir.path().join("missing.csv");
    let err = run(&config, &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, EtlError::Open { .. }), "{err}");
}

#[test]
fn test_bad_flag_reports_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    fs::write(&path, "1,A,30,2020-01-01,,1\n2,B,31,2020-01-01,,maybe\n").unwrap();
    match read_records::<Customer>(&path) {
        Err(EtlError::Record { line, .. }) => assert_eq!(line, Some(2)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_short_row_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("products.csv");
    fs::write(&path, "10,Lamp,1.0,2020-01-01,,1\n11,Chair\n").unwrap();
    assert!(matches!(
        read_records::<Product>(&path),
        Err(EtlError::Record { line: Some(2), .. })
    ));
}

#[test]
fn test_records_are_trimmed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    fs::write(&path, " 4 , 9 Elm Close ,  , 2020-01-01 , , no \n").unwrap();
    let records = read_records::<Customer>(&path).unwrap();
    assert_eq!(
        records,
        vec![Customer {
            id: 4,
            address: "9 Elm Close".to_string(),
            age: None,
            start_date: "2020-01-01".to_string(),
            end_date: None,
            current: false,
        }]
    );
}
