use crosstab_core::{
    AggregateField, BucketSpec, Clause, ColumnSchema, ConfigError, FieldValue, PivotColumnSpec,
    PivotConfiguration, Record, MAX_DISCOVERED_BUCKETS,
};
use crosstab_engine::{EphemeralDataset, PivotEngine, PivotError, RELATION_NAME};
use pretty_assertions::assert_eq;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    serde_json::from_value(value).expect("record fixture")
}

fn month_records() -> Vec<Record> {
    vec![
        record(json!({"id": 1, "month": "2022-01", "amount": 10})),
        record(json!({"id": 2, "month": "2022-01", "amount": 5})),
        record(json!({"id": 3, "month": "2022-02", "amount": 7})),
    ]
}

fn month_pivot_config() -> PivotConfiguration {
    PivotConfiguration {
        pivot_column: Some(PivotColumnSpec {
            case_column: "month".to_string(),
            sum_column: "amount".to_string(),
            buckets: None,
        }),
        aggregation: vec![AggregateField::new("amount")],
        ..Default::default()
    }
}

#[tokio::test(flavor = "current_thread")]
async fn worked_example_month_pivot() {
    let engine = PivotEngine::new();
    let result = engine
        .pivot(&month_records(), &month_pivot_config())
        .await
        .expect("pivot");

    assert_eq!(result.columns, vec!["2022-01", "2022-02", "amount"]);
    assert_eq!(result.len(), 1);

    let maps = result.row_maps();
    let row = &maps[0];
    assert_eq!(row["2022-01"], FieldValue::Number(15.0));
    assert_eq!(row["2022-02"], FieldValue::Number(7.0));
    assert_eq!(row["amount"], FieldValue::Number(22.0));
}

#[tokio::test(flavor = "current_thread")]
async fn single_column_sum_round_trips() {
    let records: Vec<Record> = (1..=20)
        .map(|i| record(json!({"id": i, "amount": i})))
        .collect();
    let config = PivotConfiguration::new(vec![AggregateField::new("amount")]);

    let engine = PivotEngine::new();
    let result = engine.pivot(&records, &config).await.expect("pivot");
    assert_eq!(result.value(0, "amount"), Some(&FieldValue::Number(210.0)));
}

#[tokio::test(flavor = "current_thread")]
async fn grouped_totals_follow_the_sort_clause() {
    let config = PivotConfiguration {
        aggregation: vec![AggregateField::new("amount")],
        group_by: vec!["month".to_string()],
        sort_by: vec!["month".to_string()],
        ..Default::default()
    };

    let engine = PivotEngine::new();
    let result = engine
        .pivot(&month_records(), &config)
        .await
        .expect("pivot");

    assert_eq!(result.columns, vec!["month", "amount"]);
    assert_eq!(
        result.rows,
        vec![
            vec![FieldValue::from("2022-01"), FieldValue::Number(15.0)],
            vec![FieldValue::from("2022-02"), FieldValue::Number(7.0)],
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn explicit_buckets_collapse_multiple_values() {
    let mut config = month_pivot_config();
    config.pivot_column.as_mut().unwrap().buckets = Some(vec![BucketSpec {
        label: "Q1".to_string(),
        values: vec!["2022-01".into(), "2022-02".into(), "2022-03".into()],
    }]);

    let engine = PivotEngine::new();
    let result = engine
        .pivot(&month_records(), &config)
        .await
        .expect("pivot");

    assert_eq!(result.columns, vec!["Q1", "amount"]);
    assert_eq!(result.value(0, "Q1"), Some(&FieldValue::Number(22.0)));
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_aggregation_field_is_rejected_before_execution() {
    let config = PivotConfiguration::new(vec![AggregateField::new("amountMissing")]);

    let engine = PivotEngine::new();
    let err = engine
        .pivot(&month_records(), &config)
        .await
        .expect_err("validation failure");
    assert_eq!(
        err,
        PivotError::Config(ConfigError::UnknownField {
            field: "amountMissing".to_string(),
            clause: Clause::Aggregation,
        })
    );
}

#[tokio::test(flavor = "current_thread")]
async fn empty_record_batch_is_rejected() {
    let engine = PivotEngine::new();
    let err = engine
        .pivot(&[], &month_pivot_config())
        .await
        .expect_err("empty dataset");
    assert_eq!(err, PivotError::Config(ConfigError::EmptyDataset));
}

#[tokio::test(flavor = "current_thread")]
async fn discovery_cap_boundary_at_150() {
    let engine = PivotEngine::new();

    let at_cap: Vec<Record> = (0..MAX_DISCOVERED_BUCKETS)
        .map(|i| record(json!({"id": i, "category": format!("c{i:03}"), "amount": 1})))
        .collect();
    let config = PivotConfiguration {
        pivot_column: Some(PivotColumnSpec {
            case_column: "category".to_string(),
            sum_column: "amount".to_string(),
            buckets: None,
        }),
        aggregation: vec![AggregateField::new("amount")],
        ..Default::default()
    };

    let result = engine.pivot(&at_cap, &config).await.expect("pivot at cap");
    assert_eq!(result.columns.len(), MAX_DISCOVERED_BUCKETS + 1);
    assert_eq!(
        result.value(0, "amount"),
        Some(&FieldValue::Number(MAX_DISCOVERED_BUCKETS as f64))
    );
    // Discovery order is first-encounter order.
    assert_eq!(result.columns[0], "c000");

    let over_cap: Vec<Record> = (0..=MAX_DISCOVERED_BUCKETS)
        .map(|i| record(json!({"id": i, "category": format!("c{i:03}"), "amount": 1})))
        .collect();
    let err = engine
        .pivot(&over_cap, &config)
        .await
        .expect_err("cap exceeded");
    assert_eq!(
        err,
        PivotError::Config(ConfigError::BucketLimitExceeded {
            distinct: MAX_DISCOVERED_BUCKETS + 1,
            limit: MAX_DISCOVERED_BUCKETS,
        })
    );
}

#[tokio::test(flavor = "current_thread")]
async fn batch_matches_independent_single_runs() {
    let grouped = PivotConfiguration {
        aggregation: vec![AggregateField::new("amount")],
        group_by: vec!["month".to_string()],
        sort_by: vec!["month".to_string()],
        ..Default::default()
    };
    let configs = vec![grouped.clone(), month_pivot_config()];

    let engine = PivotEngine::new();
    let records = month_records();

    let batch = engine
        .pivot_batch(&records, &configs)
        .await
        .expect("batch");
    let single_a = engine.pivot(&records, &grouped).await.expect("single a");
    let single_b = engine
        .pivot(&records, &month_pivot_config())
        .await
        .expect("single b");

    assert_eq!(batch, vec![single_a, single_b]);
}

#[tokio::test(flavor = "current_thread")]
async fn duplicate_identity_keys_are_silently_skipped() {
    let records = vec![
        record(json!({"id": 1, "amount": 10})),
        record(json!({"id": 1, "amount": 99})),
    ];
    let config = PivotConfiguration::new(vec![AggregateField::new("amount")]);

    let engine = PivotEngine::new();
    let result = engine.pivot(&records, &config).await.expect("pivot");
    assert_eq!(result.value(0, "amount"), Some(&FieldValue::Number(10.0)));
}

#[tokio::test(flavor = "current_thread")]
async fn clear_after_failed_query_leaves_zero_rows() {
    let records = month_records();
    let schema = ColumnSchema::infer_from_records(&records).expect("schema");
    let dataset = EphemeralDataset::create(&schema).await.expect("create");
    dataset.load(&records).await.expect("load");
    assert_eq!(dataset.row_count().await.expect("count"), 3);

    dataset
        .query("SELECT definitely_not_a_column FROM nowhere")
        .await
        .expect_err("malformed query");

    dataset.clear().await.expect("clear");
    let count = dataset
        .query(&format!("SELECT COUNT(*) FROM \"{RELATION_NAME}\""))
        .await
        .expect("count query");
    assert_eq!(count.rows[0][0], FieldValue::Number(0.0));
}

#[tokio::test(flavor = "current_thread")]
async fn clear_is_idempotent_on_a_never_loaded_dataset() {
    let schema = ColumnSchema::infer_from_records(&month_records()).expect("schema");
    let dataset = EphemeralDataset::create(&schema).await.expect("create");
    dataset.clear().await.expect("first clear");
    dataset.clear().await.expect("second clear");
    assert_eq!(dataset.row_count().await.expect("count"), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_fields_load_as_null_and_are_ignored_by_sum() {
    let records = vec![
        record(json!({"id": 1, "month": "2022-01", "amount": 10})),
        record(json!({"id": 2, "month": "2022-02"})),
    ];
    let config = PivotConfiguration::new(vec![AggregateField::new("amount")]);

    let engine = PivotEngine::new();
    let result = engine.pivot(&records, &config).await.expect("pivot");
    // SQL SUM ignores NULLs.
    assert_eq!(result.value(0, "amount"), Some(&FieldValue::Number(10.0)));
}

#[tokio::test(flavor = "current_thread")]
async fn configuration_authored_as_json_runs_end_to_end() {
    let config: PivotConfiguration = serde_json::from_value(json!({
        "pivot_column": {"case_column": "month", "sum_column": "amount"},
        "aggregation": [{"column": "amount", "alias": "total"}],
    }))
    .expect("config fixture");

    let engine = PivotEngine::new();
    let result = engine
        .pivot(&month_records(), &config)
        .await
        .expect("pivot");
    assert_eq!(result.columns, vec!["2022-01", "2022-02", "total"]);
    assert_eq!(result.value(0, "total"), Some(&FieldValue::Number(22.0)));
}
