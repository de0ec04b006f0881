//! Compilation of a validated configuration into one aggregate SQL query.
//!
//! The assembler supports exactly one query shape: a flat aggregate with
//! optional pivot-case columns, group-by, and order-by. It is a pure function
//! of its inputs; identical inputs produce byte-identical SQL. Every
//! identifier and literal is neutralized before interpolation (quoting with
//! doubled escapes), and raw group-by/sort-by text is re-checked for
//! statement delimiters even though validation already rejected them.

use crate::buckets::ResolvedBuckets;
use crate::config::{ensure_no_delimiter, GroupByEntry, PivotConfiguration};
use crate::error::{ConfigError, ConfigResult};
use crate::value::FieldValue;

/// Quote an identifier for interpolation, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a text literal for interpolation, doubling embedded quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn literal(value: &FieldValue) -> String {
    match value {
        // NULL never appears here; it is routed to an IS NULL predicate.
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Bool(b) => quote_literal(if *b { "true" } else { "false" }),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(s) => quote_literal(s),
    }
}

/// Compile a validated configuration plus its resolved buckets into one
/// aggregate query against `relation`.
///
/// Select-list order: group-by expressions (original text, alias included),
/// then bucket case-sums in bucket order, then plain aggregation sums in
/// declared order. GROUP BY uses only the pre-alias portion of each group-by
/// entry; ORDER BY lists the sort columns in declared order.
pub fn assemble_pivot_query(
    config: &PivotConfiguration,
    buckets: Option<&ResolvedBuckets>,
    relation: &str,
) -> ConfigResult<String> {
    let mut select = Vec::new();

    let entries: Vec<GroupByEntry> = config
        .group_by
        .iter()
        .map(|text| {
            ensure_no_delimiter(text)?;
            Ok(GroupByEntry::parse(text))
        })
        .collect::<ConfigResult<_>>()?;

    for entry in &entries {
        select.push(entry.text.clone());
    }

    if let (Some(pivot), Some(buckets)) = (&config.pivot_column, buckets) {
        for bucket in buckets {
            let predicate = bucket_predicate(&pivot.case_column, bucket.values.as_slice())
                .ok_or_else(|| ConfigError::EmptyBucket {
                    label: bucket.label.clone(),
                })?;
            select.push(format!(
                "SUM(CASE WHEN {predicate} THEN {} ELSE 0 END) AS {}",
                quote_ident(&pivot.sum_column),
                quote_ident(&bucket.label),
            ));
        }
    }

    for field in &config.aggregation {
        select.push(format!(
            "SUM({}) AS {}",
            quote_ident(field.column()),
            quote_ident(field.alias()),
        ));
    }

    if select.is_empty() {
        return Err(ConfigError::EmptySelect);
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        select.join(", "),
        quote_ident(relation)
    );

    if !entries.is_empty() {
        let keys: Vec<&str> = entries.iter().map(|e| e.expression.as_str()).collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&keys.join(", "));
    }

    if !config.sort_by.is_empty() {
        let keys: Vec<String> = config
            .sort_by
            .iter()
            .map(|column| {
                ensure_no_delimiter(column)?;
                Ok(quote_ident(column))
            })
            .collect::<ConfigResult<_>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    Ok(sql)
}

/// Build the routing predicate for one bucket. A singleton value collapses to
/// an equality test; multiple values become a set-membership test; SQL NULL
/// is matched with IS NULL. Returns `None` for an empty value set.
fn bucket_predicate(case_column: &str, values: &[FieldValue]) -> Option<String> {
    let column = quote_ident(case_column);
    let non_null: Vec<&FieldValue> = values.iter().filter(|v| !v.is_null()).collect();
    let has_null = values.iter().any(FieldValue::is_null);

    let mut parts = Vec::new();
    match non_null.as_slice() {
        [] => {}
        [single] => parts.push(format!("{column} = {}", literal(single))),
        many => {
            let list: Vec<String> = many.iter().map(|v| literal(v)).collect();
            parts.push(format!("{column} IN ({})", list.join(", ")));
        }
    }
    if has_null {
        parts.push(format!("{column} IS NULL"));
    }

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(" OR "))),
    }
}
