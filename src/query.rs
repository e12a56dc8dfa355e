//! Pure table derivation pipeline: search filter, per-column value filters,
//! sort, and pagination over one slot's data.
//!
//! `render` is a pure function of `(TableData, QueryState)`; recomputing it
//! on demand replaces the reactive derivation graph a UI layer would
//! otherwise maintain. Step order is fixed: search, column filters, sort,
//! paginate. Reordering the steps changes results.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;

use crate::slot::{Row, TableData};

/// Supported page sizes. `QueryState::set_page_size` rejects anything else.
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Maximum number of page labels shown before the pager collapses ranges
/// into gaps.
const PAGER_FULL_LIMIT: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Search/sort/filter/page configuration for one slot's table view. Created
/// lazily with defaults on first access and kept until the owning batch
/// resets.
#[derive(Clone, Debug)]
pub struct QueryState {
    pub search: String,
    pub sort: Option<(String, SortDirection)>,
    pub column_filters: HashMap<String, HashSet<String>>,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort: None,
            column_filters: HashMap::new(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryState {
    /// Changing the search term jumps back to the first page.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page_index = 0;
    }

    /// Tri-state cycle on the active column: ascending, descending, unsorted.
    /// Toggling a different column always starts it ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        self.sort = match self.sort.take() {
            Some((col, SortDirection::Ascending)) if col == column => {
                Some((col, SortDirection::Descending))
            }
            Some((col, SortDirection::Descending)) if col == column => None,
            _ => Some((column.to_string(), SortDirection::Ascending)),
        };
        self.page_index = 0;
    }

    /// Replace the selected-value set for a column. An empty set imposes no
    /// constraint ("no filter", not "exclude all").
    pub fn set_filter(&mut self, column: &str, values: HashSet<String>) {
        if values.is_empty() {
            self.column_filters.remove(column);
        } else {
            self.column_filters.insert(column.to_string(), values);
        }
        self.page_index = 0;
    }

    pub fn clear_filter(&mut self, column: &str) {
        self.column_filters.remove(column);
        self.page_index = 0;
    }

    /// Out-of-range pages are tolerated; `render` clamps before slicing.
    pub fn set_page(&mut self, index: usize) {
        self.page_index = index;
    }

    /// Accepts only the supported fixed sizes, otherwise keeps the previous
    /// size. Any accepted change jumps back to the first page.
    pub fn set_page_size(&mut self, size: usize) {
        if PAGE_SIZE_OPTIONS.contains(&size) {
            self.page_size = size;
            self.page_index = 0;
        }
    }
}

/// Pager entry: an addressable page or a collapsed range marker. Gaps are
/// never addressable as pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageLabel {
    Page(usize),
    Gap,
}

/// One rendered page of a slot's table.
#[derive(Clone, Debug, PartialEq)]
pub struct TablePage {
    /// Rows of the active page, at most `page_size` of them.
    pub rows: Vec<Row>,
    /// Count after search and column filters (sorting never changes it).
    pub total_filtered: usize,
    pub total_pages: usize,
    /// The clamped page index actually rendered.
    pub page_index: usize,
    pub page_labels: Vec<PageLabel>,
}

/// Stringified cell for searching, filtering, and text comparison. Nulls and
/// missing cells are the empty string.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Numeric interpretation of a cell's text. NaN parses are rejected so the
/// sort comparator keeps a total order.
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Numeric-ness of a column, decided on the unfiltered data so filtering
/// cannot flip the comparison mode. A column is numeric when any non-empty
/// value parses as a number; unparseable entries in such a column compare
/// after every number. A column with no non-empty values at all is
/// vacuously numeric.
pub fn column_is_numeric(data: &TableData, column: &str) -> bool {
    let mut saw_value = false;
    for row in &data.rows {
        let text = cell_text(row.get(column));
        if text.trim().is_empty() {
            continue;
        }
        if parse_number(&text).is_some() {
            return true;
        }
        saw_value = true;
    }
    !saw_value
}

/// Distinct stringified values of a column, sorted, for filter pickers.
/// Empty cells are skipped.
pub fn unique_column_values(data: &TableData, column: &str) -> Vec<String> {
    let mut values = BTreeSet::new();
    for row in &data.rows {
        let text = cell_text(row.get(column));
        if !text.trim().is_empty() {
            values.insert(text);
        }
    }
    values.into_iter().collect()
}

fn matches_search(row: &Row, columns: &[String], term: &str) -> bool {
    columns
        .iter()
        .any(|col| cell_text(row.get(col)).to_lowercase().contains(term))
}

fn matches_filters(row: &Row, filters: &HashMap<String, HashSet<String>>) -> bool {
    filters.iter().all(|(col, selected)| {
        selected.is_empty() || selected.contains(&cell_text(row.get(col)))
    })
}

/// Compare two cells in a numeric column. Unparseable entries sort after any
/// valid number in both directions; the direction sign only reverses the
/// order of parseable pairs.
fn compare_numeric(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.total_cmp(&y);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Render one page of a slot's table under the given query state.
pub fn render(data: &TableData, query: &QueryState) -> TablePage {
    let term = query.search.trim().to_lowercase();

    let mut rows: Vec<&Row> = data
        .rows
        .iter()
        .filter(|row| term.is_empty() || matches_search(row, &data.columns, &term))
        .filter(|row| matches_filters(row, &query.column_filters))
        .collect();

    if let Some((column, direction)) = &query.sort {
        if column_is_numeric(data, column) {
            rows.sort_by(|a, b| {
                compare_numeric(
                    parse_number(&cell_text(a.get(column))),
                    parse_number(&cell_text(b.get(column))),
                    *direction,
                )
            });
        } else {
            rows.sort_by(|a, b| {
                let ord = cell_text(a.get(column))
                    .to_lowercase()
                    .cmp(&cell_text(b.get(column)).to_lowercase());
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }
    }

    let total_filtered = rows.len();
    let page_size = query.page_size.max(1);
    let total_pages = total_filtered.div_ceil(page_size);
    let page_index = if total_pages == 0 {
        0
    } else {
        query.page_index.min(total_pages - 1)
    };

    let start = (page_index * page_size).min(total_filtered);
    let end = (start + page_size).min(total_filtered);
    let rows = rows[start..end].iter().map(|row| (*row).clone()).collect();

    TablePage {
        rows,
        total_filtered,
        total_pages,
        page_index,
        page_labels: page_labels(total_pages, page_index),
    }
}

/// Pager display list. All pages when there are at most seven; otherwise a
/// window anchored to the start, end, or current page, with gaps collapsing
/// the rest.
fn page_labels(total_pages: usize, current: usize) -> Vec<PageLabel> {
    if total_pages <= PAGER_FULL_LIMIT {
        return (0..total_pages).map(PageLabel::Page).collect();
    }

    let mut labels = Vec::with_capacity(PAGER_FULL_LIMIT + 2);
    if current <= 3 {
        labels.extend((0..5).map(PageLabel::Page));
        labels.push(PageLabel::Gap);
        labels.push(PageLabel::Page(total_pages - 1));
    } else if current >= total_pages - 4 {
        labels.push(PageLabel::Page(0));
        labels.push(PageLabel::Gap);
        labels.extend((total_pages - 5..total_pages).map(PageLabel::Page));
    } else {
        labels.push(PageLabel::Page(0));
        labels.push(PageLabel::Gap);
        labels.extend((current - 1..=current + 1).map(PageLabel::Page));
        labels.push(PageLabel::Gap);
        labels.push(PageLabel::Page(total_pages - 1));
    }
    labels
}
