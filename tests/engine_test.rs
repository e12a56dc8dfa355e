//! Pipeline properties over realistic slot data: determinism, ordering,
//! pagination arithmetic, and predicate composition.

use std::collections::HashSet;

use serde_json::{json, Value};

use rowdeck::query::{cell_text, render, QueryState};
use rowdeck::slot::{Row, TableData};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn captives() -> TableData {
    let rows = vec![
        row(&[("Captive Name", json!("Acme")), ("Units", json!("120")), ("Region", json!("East"))]),
        row(&[("Captive Name", json!("Borealis")), ("Units", json!("85")), ("Region", json!("West"))]),
        row(&[("Captive Name", json!("acme south")), ("Units", json!("n/a")), ("Region", json!("East"))]),
        row(&[("Captive Name", json!("Cobalt")), ("Units", Value::Null), ("Region", json!("North"))]),
        row(&[("Captive Name", json!("Delta")), ("Units", json!("7")), ("Region", json!("West"))]),
    ];
    TableData {
        columns: vec!["Captive Name".into(), "Units".into(), "Region".into()],
        total_rows: rows.len(),
        rows,
    }
}

fn names(data: &TableData, query: &QueryState) -> Vec<String> {
    render(data, query)
        .rows
        .iter()
        .map(|r| cell_text(r.get("Captive Name")))
        .collect()
}

#[test]
fn identical_inputs_yield_identical_output() {
    let data = captives();
    let mut query = QueryState::default();
    query.set_search("e");
    query.toggle_sort("Units");
    query.set_filter("Region", HashSet::from(["East".into(), "West".into()]));

    let once = render(&data, &query);
    let twice = render(&data, &query);
    assert_eq!(once, twice);
}

#[test]
fn numeric_sort_with_unparseable_and_null_entries() {
    let data = captives();
    let mut query = QueryState::default();

    // Units is numeric; "n/a" and the null sort after all numbers, keeping
    // their relative input order, in both directions.
    query.toggle_sort("Units");
    assert_eq!(
        names(&data, &query),
        vec!["Delta", "Borealis", "Acme", "acme south", "Cobalt"]
    );
    query.toggle_sort("Units");
    assert_eq!(
        names(&data, &query),
        vec!["Acme", "Borealis", "Delta", "acme south", "Cobalt"]
    );
}

#[test]
fn text_sort_ignores_case() {
    let data = captives();
    let mut query = QueryState::default();
    query.toggle_sort("Captive Name");
    assert_eq!(
        names(&data, &query),
        vec!["Acme", "acme south", "Borealis", "Cobalt", "Delta"]
    );
}

#[test]
fn filter_then_search_equals_conjunctive_pass() {
    let data = captives();

    let mut filter_only = QueryState::default();
    filter_only.set_filter("Region", HashSet::from(["East".into()]));
    let filtered: Vec<String> = names(&data, &filter_only);

    let mut search_only = QueryState::default();
    search_only.set_search("acme");
    let searched: Vec<String> = names(&data, &search_only);

    let mut both = QueryState::default();
    both.set_filter("Region", HashSet::from(["East".into()]));
    both.set_search("acme");

    let expected: Vec<String> = filtered
        .iter()
        .filter(|n| searched.contains(n))
        .cloned()
        .collect();
    assert_eq!(names(&data, &both), expected);
}

#[test]
fn pages_concatenate_to_the_sorted_filtered_sequence() {
    let rows: Vec<Row> = (0..57)
        .map(|i| row(&[("id", json!(i)), ("value", json!(57 - i))]))
        .collect();
    let data = TableData {
        columns: vec!["id".into(), "value".into()],
        total_rows: rows.len(),
        rows,
    };

    let mut query = QueryState::default();
    query.toggle_sort("value");
    query.set_page_size(10);

    let full_pages = render(&data, &query).total_pages;
    assert_eq!(full_pages, 6);

    let mut collected = Vec::new();
    for page_index in 0..full_pages {
        query.set_page(page_index);
        let page = render(&data, &query);
        assert!(page.rows.len() <= query.page_size);
        collected.extend(page.rows.iter().map(|r| cell_text(r.get("value"))));
    }
    let expected: Vec<String> = (1..=57).map(|v| v.to_string()).collect();
    assert_eq!(collected, expected);
}

#[test]
fn out_of_range_page_clamps_to_last() {
    let rows: Vec<Row> = (0..23).map(|i| row(&[("n", json!(i))])).collect();
    let data = TableData {
        columns: vec!["n".into()],
        total_rows: rows.len(),
        rows,
    };
    let mut query = QueryState::default();
    query.set_page_size(10);
    query.set_page(5);
    let page = render(&data, &query);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.page_index, 2);
    assert_eq!(page.rows.len(), 3);
}

#[test]
fn zero_rows_and_zero_columns_render_without_special_cases() {
    let data = TableData::default();
    let mut query = QueryState::default();
    query.set_search("anything");
    query.toggle_sort("missing");
    let page = render(&data, &query);
    assert_eq!(page.total_filtered, 0);
    assert_eq!(page.total_pages, 0);
    assert!(page.rows.is_empty());
}

#[test]
fn sorting_never_changes_the_filtered_count() {
    let data = captives();
    let mut query = QueryState::default();
    query.set_filter("Region", HashSet::from(["West".into()]));
    let unsorted = render(&data, &query).total_filtered;
    query.toggle_sort("Units");
    assert_eq!(render(&data, &query).total_filtered, unsorted);
}
