//! Searchable, paginated listing of one table

use std::cmp::Ordering;
use std::rc::Rc;

use clinic_core::{Result, Value};
use clinic_query::{FetchedRow, RecordRef, Session};

use crate::input::display_text;

/// Listing options shared by every view of a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Rows per page
    pub page_size: usize,
    /// Maximum rows fetched per table
    pub fetch_limit: usize,
    /// Whether column filters match case
    pub case_sensitive: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            fetch_limit: 1000,
            case_sensitive: false,
        }
    }
}

/// How clicks select rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    None,
    Single,
    Multiple,
}

/// Rows of one table with per-column filters, paging and selection
#[derive(Debug)]
pub struct TableView {
    table: String,
    labels: Vec<String>,
    rows: Vec<FetchedRow>,
    filters: Vec<String>,
    options: ViewOptions,
    page: usize,
    selection: Selection,
    selected: Vec<String>,
}

/// Stable identity of a row across reloads: its primary key when stored,
/// its record id otherwise
fn row_key(record: &RecordRef) -> String {
    let record = record.borrow();
    match record.key() {
        Some(key) if !key.is_null() => format!("key:{}", display_text(key)),
        _ => format!("record:{}", record.id()),
    }
}

impl TableView {
    pub fn new(table: impl Into<String>, options: ViewOptions, selection: Selection) -> Self {
        Self {
            table: table.into(),
            labels: Vec::new(),
            rows: Vec::new(),
            filters: Vec::new(),
            options,
            page: 0,
            selection,
            selected: Vec::new(),
        }
    }

    /// Load up to `fetch_limit` rows, keeping selections that still exist
    pub fn load(&mut self, session: &Session) -> Result<()> {
        let descriptor = session.describe(&self.table)?;
        let labels = descriptor.recursive_column_labels();
        let rows = session.fetch(&self.table, self.options.fetch_limit)?;
        self.set_rows(labels, rows);
        tracing::debug!(table = %self.table, rows = self.rows.len(), "table view loaded");
        Ok(())
    }

    /// Replace the rows and column labels
    pub fn set_rows(&mut self, labels: Vec<String>, rows: Vec<FetchedRow>) {
        if self.filters.len() != labels.len() {
            self.filters = vec![String::new(); labels.len()];
        }
        self.labels = labels;
        self.rows = rows;
        let keys: Vec<String> = self.rows.iter().map(|r| row_key(&r.record)).collect();
        self.selected.retain(|k| keys.contains(k));
        self.page = self.page.min(self.page_count() - 1);
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[FetchedRow] {
        &self.rows
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn filter(&self, column: usize) -> Option<&str> {
        self.filters.get(column).map(String::as_str)
    }

    /// Set a column's substring filter and go back to the first page
    pub fn set_filter(&mut self, column: usize, text: &str) {
        if let Some(filter) = self.filters.get_mut(column) {
            *filter = text.to_string();
        }
        self.page = 0;
    }

    fn matches(&self, row: &FetchedRow) -> bool {
        self.filters.iter().enumerate().all(|(i, filter)| {
            if filter.is_empty() {
                return true;
            }
            let cell = row.display.get(i).map(display_text).unwrap_or_default();
            if self.options.case_sensitive {
                cell.contains(filter.as_str())
            } else {
                cell.to_lowercase().contains(&filter.to_lowercase())
            }
        })
    }

    /// Rows passing every filter
    pub fn filtered_rows(&self) -> Vec<&FetchedRow> {
        self.rows.iter().filter(|r| self.matches(r)).collect()
    }

    /// Filtered rows on the current page
    pub fn visible_rows(&self) -> Vec<&FetchedRow> {
        let page_size = self.options.page_size.max(1);
        self.filtered_rows()
            .into_iter()
            .skip(self.page * page_size)
            .take(page_size)
            .collect()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Number of pages; at least one
    pub fn page_count(&self) -> usize {
        let page_size = self.options.page_size.max(1);
        self.filtered_rows().len().div_ceil(page_size).max(1)
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Apply the selection policy to a click on a visible row.
    ///
    /// Returns whether the selection changed.
    pub fn click(&mut self, visible_index: usize) -> bool {
        let Some(row) = self.visible_rows().get(visible_index).copied() else {
            return false;
        };
        let key = row_key(&row.record);
        match self.selection {
            Selection::None => return false,
            Selection::Single => {
                if self.selected == [key.clone()] {
                    self.selected.clear();
                } else {
                    self.selected = vec![key];
                }
            }
            Selection::Multiple => {
                if let Some(position) = self.selected.iter().position(|k| *k == key) {
                    self.selected.remove(position);
                } else {
                    self.selected.push(key);
                }
            }
        }
        true
    }

    /// Select the row whose primary key equals `key`
    pub fn select_key(&mut self, key: &Value) -> bool {
        if self.selection == Selection::None {
            return false;
        }
        let found = self.rows.iter().find(|r| {
            r.record
                .borrow()
                .key()
                .is_some_and(|k| k.compare(key) == Some(Ordering::Equal))
        });
        let Some(row) = found else {
            return false;
        };
        let found_key = row_key(&row.record);
        match self.selection {
            Selection::Single => self.selected = vec![found_key],
            _ => {
                if !self.selected.contains(&found_key) {
                    self.selected.push(found_key);
                }
            }
        }
        true
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Whether a visible row is selected
    pub fn is_selected(&self, row: &FetchedRow) -> bool {
        self.selected.contains(&row_key(&row.record))
    }

    /// Selected records in row order
    pub fn selected_records(&self) -> Vec<RecordRef> {
        self.rows
            .iter()
            .filter(|r| self.is_selected(r))
            .map(|r| Rc::clone(&r.record))
            .collect()
    }

    pub fn selected_record(&self) -> Option<RecordRef> {
        self.selected_records().into_iter().next()
    }
}
