//! Sort, filter and paginate over in-memory records.
//!
//! Every function here is pure: the source slice is never mutated and bad
//! paging input degrades to an empty result instead of an error.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use icu_collator::{Collator, CollatorOptions, Strength};
use icu_locid::Locale;
use tracing::{debug, warn};

use crate::format::LocaleFormat;
use crate::value::{Primitive, Record, Value, ValueKind};

pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        self == SortDirection::Ascending
    }

    pub fn marker(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Ordering of text values when both sides of a comparison are text.
pub trait Collation {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Compares the lowercased strings. Used when no locale collator is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl Collation for CaseInsensitive {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase))
    }
}

/// Unicode collation for a locale tag such as `ru-RU`, at secondary strength:
/// case differences compare equal, accents do not.
pub struct LocaleCollation {
    collator: Option<Collator>,
}

impl LocaleCollation {
    pub fn for_locale(tag: &str) -> Self {
        let locale = tag.parse::<Locale>().unwrap_or_else(|e| {
            warn!("Unparsable locale {tag:?} ({e}), collating with root rules");
            Locale::UND
        });
        let mut options = CollatorOptions::new();
        options.strength = Some(Strength::Secondary);
        let collator = match Collator::try_new(&locale.into(), options) {
            Ok(collator) => Some(collator),
            Err(e) => {
                warn!("No collation data for {tag:?} ({e}), falling back to lowercase order");
                None
            }
        };
        Self { collator }
    }

    pub fn for_format(format: &LocaleFormat) -> Self {
        Self::for_locale(&format.locale)
    }
}

impl Default for LocaleCollation {
    fn default() -> Self {
        Self::for_format(&LocaleFormat::default())
    }
}

impl Collation for LocaleCollation {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => CaseInsensitive.compare(a, b),
        }
    }
}

pub type Accessor<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub type Renderer<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Describes one displayable field of `T`.
pub struct ColumnDescriptor<T> {
    pub key: String,
    pub title: String,
    pub sortable: bool,
    pub width: Option<u16>,
    accessor: Accessor<T>,
    render: Option<Renderer<T>>,
}

impl<T> Clone for ColumnDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            title: self.title.clone(),
            sortable: self.sortable,
            width: self.width,
            accessor: Arc::clone(&self.accessor),
            render: self.render.clone(),
        }
    }
}

impl<T> fmt::Debug for ColumnDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("sortable", &self.sortable)
            .field("width", &self.width)
            .field("render", &self.render.is_some())
            .finish()
    }
}

impl<T> ColumnDescriptor<T> {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        accessor: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            sortable: true,
            width: None,
            accessor: Arc::new(accessor),
            render: None,
        }
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn render(mut self, render: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn value(&self, record: &T) -> Value {
        (self.accessor)(record)
    }

    /// Text shown in a cell. A custom renderer wins over locale formatting.
    pub fn display(&self, record: &T, locale: &LocaleFormat) -> String {
        match &self.render {
            Some(render) => render(record),
            None => locale.format_value(&self.value(record)),
        }
    }
}

impl ColumnDescriptor<Record> {
    /// Text columns for schemaless records, one per key in first-seen order.
    pub fn for_records(records: &[Record]) -> Vec<ColumnDescriptor<Record>> {
        Record::union_keys(records)
            .into_iter()
            .map(|key| ColumnDescriptor::new(key.clone(), key.clone(), Record::field(key)))
            .collect()
    }
}

fn compare_values(
    a: &Value,
    b: &Value,
    direction: SortDirection,
    collation: &dyn Collation,
) -> Ordering {
    let ascending = direction.is_ascending();
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => {
            return if ascending { Ordering::Less } else { Ordering::Greater };
        }
        (false, true) => {
            return if ascending { Ordering::Greater } else { Ordering::Less };
        }
        (false, false) => {}
    }

    match (a.kind(), b.kind()) {
        (ValueKind::Text, ValueKind::Text) => {
            let ord = collation.compare(
                a.as_str().unwrap_or_default(),
                b.as_str().unwrap_or_default(),
            );
            if ascending { ord } else { ord.reverse() }
        }
        (ValueKind::Numeric, ValueKind::Numeric) => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            let diff = if ascending { x - y } else { y - x };
            diff.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
        }
        _ => compare_relational(a, b, ascending),
    }
}

// `>` first, then `<`, otherwise a tie. Direction swaps the first two outcomes.
fn compare_relational(a: &Value, b: &Value, ascending: bool) -> Ordering {
    let (pa, pb) = (a.to_primitive(), b.to_primitive());
    let (greater, less) = match (&pa, &pb) {
        (Primitive::Str(x), Primitive::Str(y)) => (x > y, x < y),
        _ => {
            let (x, y) = (pa.to_number(), pb.to_number());
            (x > y, x < y)
        }
    };
    if greater {
        if ascending { Ordering::Greater } else { Ordering::Less }
    } else if less {
        if ascending { Ordering::Less } else { Ordering::Greater }
    } else {
        Ordering::Equal
    }
}

// Mixed-type columns do not give a total order, and the std sorts may panic on
// that. A plain stable merge sort keeps the result deterministic instead.
fn merge_sort<T>(mut items: Vec<T>, cmp: &impl Fn(&T, &T) -> Ordering) -> Vec<T> {
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp);
    let right = merge_sort(right, cmp);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(r, l) == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged
}

/// Sorted copy of `records`, ordered by the value `accessor` reads from each one.
pub fn sort_records<T: Clone>(
    records: &[T],
    accessor: impl Fn(&T) -> Value,
    direction: SortDirection,
) -> Vec<T> {
    sort_records_with(records, accessor, direction, &LocaleCollation::default())
}

pub fn sort_records_with<T: Clone>(
    records: &[T],
    accessor: impl Fn(&T) -> Value,
    direction: SortDirection,
    collation: &dyn Collation,
) -> Vec<T> {
    let keyed: Vec<(Value, usize)> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (accessor(record), idx))
        .collect();
    let cmp = |a: &(Value, usize), b: &(Value, usize)| {
        compare_values(&a.0, &b.0, direction, collation)
    };
    let sorted = merge_sort(keyed, &cmp);
    sorted
        .into_iter()
        .map(|(_, idx)| records[idx].clone())
        .collect()
}

/// Records where any column's display string contains `term`, ignoring case.
///
/// A blank term returns the input slice itself.
pub fn filter_records<'a, T: Clone>(
    records: &'a [T],
    term: &str,
    columns: &[ColumnDescriptor<T>],
) -> Cow<'a, [T]> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Cow::Borrowed(records);
    }

    let is_match = |record: &T| {
        columns.iter().any(|column| {
            let value = column.value(record);
            !value.is_null() && value.to_string().to_lowercase().contains(&needle)
        })
    };
    Cow::Owned(records.iter().filter(|r| is_match(*r)).cloned().collect())
}

/// The 1-based `page` of `records`. Non-positive `page` or `page_size` gives an empty slice.
pub fn paginate<T>(records: &[T], page: i64, page_size: i64) -> &[T] {
    if page <= 0 || page_size <= 0 {
        return &[];
    }
    let size = usize::try_from(page_size).unwrap_or(usize::MAX);
    let start = usize::try_from(page - 1)
        .unwrap_or(usize::MAX)
        .saturating_mul(size)
        .min(records.len());
    let end = start.saturating_add(size).min(records.len());
    &records[start..end]
}

pub fn total_pages(total_items: usize, page_size: i64) -> usize {
    if page_size <= 0 {
        return 0;
    }
    total_items.div_ceil(usize::try_from(page_size).unwrap_or(usize::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

/// Sort, search and page selection of one list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub sort: Option<SortState>,
    pub search: String,
    pub page: i64,
    pub page_size: i64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// The rows visible for a `ViewState` plus the totals needed for a pager.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<T> {
    pub rows: Vec<T>,
    pub total_items: usize,
    pub total_pages: usize,
    pub page: i64,
}

impl ViewState {
    pub fn new(page_size: i64) -> Self {
        Self {
            sort: None,
            search: String::new(),
            page: 1,
            page_size,
        }
    }

    /// Cycles the sort on `key`: ascending, descending, off. Another key starts ascending.
    pub fn toggle_sort(&mut self, key: &str) {
        self.sort = match self.sort.take() {
            Some(SortState { key: current, direction }) if current == key => match direction {
                SortDirection::Ascending => Some(SortState {
                    key: current,
                    direction: SortDirection::Descending,
                }),
                SortDirection::Descending => None,
            },
            _ => Some(SortState {
                key: key.to_string(),
                direction: SortDirection::Ascending,
            }),
        };
        self.page = 1;
    }

    pub fn set_sort(&mut self, key: &str, direction: SortDirection) {
        self.sort = Some(SortState {
            key: key.to_string(),
            direction,
        });
        self.page = 1;
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    pub fn sort_direction(&self, key: &str) -> Option<SortDirection> {
        self.sort
            .as_ref()
            .filter(|s| s.key == key)
            .map(|s| s.direction)
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 1;
    }

    pub fn set_page(&mut self, page: i64, total_pages: usize) {
        let last = i64::try_from(total_pages.max(1)).unwrap_or(i64::MAX);
        self.page = page.clamp(1, last);
    }

    pub fn next_page(&mut self, total_pages: usize) {
        self.set_page(self.page.saturating_add(1), total_pages);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn first_page(&mut self) {
        self.page = 1;
    }

    pub fn last_page(&mut self, total_pages: usize) {
        self.set_page(i64::try_from(total_pages).unwrap_or(i64::MAX), total_pages);
    }

    /// Filtered and sorted records across all pages.
    pub fn ordered<T: Clone>(&self, records: &[T], columns: &[ColumnDescriptor<T>]) -> Vec<T> {
        self.ordered_with(records, columns, &LocaleCollation::default())
    }

    pub fn ordered_with<T: Clone>(
        &self,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
        collation: &dyn Collation,
    ) -> Vec<T> {
        let filtered = filter_records(records, &self.search, columns);
        let sort_column = self.sort.as_ref().and_then(|sort| {
            columns
                .iter()
                .find(|c| c.key == sort.key && c.sortable)
                .map(|c| (c, sort.direction))
        });
        match sort_column {
            Some((column, direction)) => {
                sort_records_with(&filtered, |r| column.value(r), direction, collation)
            }
            None => filtered.into_owned(),
        }
    }

    pub fn apply<T: Clone>(&self, records: &[T], columns: &[ColumnDescriptor<T>]) -> PageView<T> {
        self.apply_with(records, columns, &LocaleCollation::default())
    }

    pub fn apply_with<T: Clone>(
        &self,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
        collation: &dyn Collation,
    ) -> PageView<T> {
        let ordered = self.ordered_with(records, columns, collation);
        let total_items = ordered.len();
        let total_pages = total_pages(total_items, self.page_size);
        let rows = paginate(&ordered, self.page, self.page_size).to_vec();
        debug!(
            "View: {} of {} records match, page {}/{} shows {}",
            total_items,
            records.len(),
            self.page,
            total_pages,
            rows.len()
        );
        PageView {
            rows,
            total_items,
            total_pages,
            page: self.page,
        }
    }
}
