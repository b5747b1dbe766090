//! Filter engine.
//!
//! A [`FilterSpec`] holds one accepted-value set (or date range) per
//! dimension. Empty sets mean "no restriction". Active constraints compile to
//! a list of [`Predicate`]s that are AND-ed together; values inside one
//! dimension are OR-ed. The result is a [`FilteredView`]: row indices into
//! the store, never a copy of the records.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::bucketing;
use crate::analytics::types::{AnalyticsError, AnalyticsResult};
use crate::model::{FictionFlag, Record, normalize_media};
use crate::store::RecordStore;

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// Inclusive publication-date range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// True when at least one bound is set.
    pub fn is_active(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if let (Some(start), Some(end)) = (self.start, self.end)
            && start > end
        {
            return Err(AnalyticsError::invalid(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(())
    }
}

/// Current predicate values coming from the control surface.
///
/// An empty set (or unset date bound) imposes no restriction on its
/// dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSpec {
    /// Transaction years.
    pub years: BTreeSet<i32>,
    pub subjects: BTreeSet<String>,
    /// Media types; matched after title-case normalization.
    pub media: BTreeSet<String>,
    pub authors: BTreeSet<String>,
    pub publishers: BTreeSet<String>,
    pub fiction: BTreeSet<FictionFlag>,
    pub date_range: DateRange,
}

impl FilterSpec {
    /// Parse a filter spec from JSON. Unknown keys and malformed values are
    /// reported as [`AnalyticsError::InvalidParameter`].
    pub fn from_json(value: serde_json::Value) -> AnalyticsResult<Self> {
        let spec: Self = serde_json::from_value(value)
            .map_err(|e| AnalyticsError::invalid(format!("filter spec: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        self.date_range.validate()
    }

    /// True when no dimension is constrained.
    pub fn is_unrestricted(&self) -> bool {
        self.predicates().is_empty()
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years.extend(years);
        self
    }

    pub fn with_subjects<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.subjects.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_media<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.media.extend(values.into_iter().map(|v| normalize_media(v.as_ref())));
        self
    }

    pub fn with_authors<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.authors.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_publishers<S: Into<String>>(
        mut self,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.publishers.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_fiction(mut self, values: impl IntoIterator<Item = FictionFlag>) -> Self {
        self.fiction.extend(values);
        self
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.date_range = DateRange::new(start, end);
        self
    }

    /// Compile the active constraints into predicates, in a fixed order.
    pub fn predicates(&self) -> Vec<Predicate<'_>> {
        let mut preds = Vec::new();
        if !self.years.is_empty() {
            preds.push(Predicate::Years(&self.years));
        }
        if !self.subjects.is_empty() {
            preds.push(Predicate::Subjects(&self.subjects));
        }
        if !self.media.is_empty() {
            preds.push(Predicate::Media(
                self.media.iter().map(|m| normalize_media(m)).collect(),
            ));
        }
        if !self.authors.is_empty() {
            preds.push(Predicate::Authors(&self.authors));
        }
        if !self.publishers.is_empty() {
            preds.push(Predicate::Publishers(&self.publishers));
        }
        if !self.fiction.is_empty() {
            preds.push(Predicate::Fiction(&self.fiction));
        }
        if self.date_range.is_active() {
            preds.push(Predicate::PublishedWithin(self.date_range));
        }
        preds
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// One active per-dimension constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate<'a> {
    Years(&'a BTreeSet<i32>),
    Subjects(&'a BTreeSet<String>),
    Media(BTreeSet<String>),
    Authors(&'a BTreeSet<String>),
    Publishers(&'a BTreeSet<String>),
    Fiction(&'a BTreeSet<FictionFlag>),
    /// Records with no publication date never satisfy a date constraint.
    PublishedWithin(DateRange),
}

impl Predicate<'_> {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Years(set) => set.contains(&record.transaction_year),
            Predicate::Subjects(set) => set.contains(&record.subject),
            Predicate::Media(set) => set.contains(&record.media_type),
            Predicate::Authors(set) => set.contains(&record.author),
            Predicate::Publishers(set) => set.contains(&record.publisher),
            Predicate::Fiction(set) => set.contains(&record.fiction),
            Predicate::PublishedWithin(range) => record
                .publication_date
                .is_some_and(|d| bucketing::within(d, range.start, range.end)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Years(_) => "years",
            Predicate::Subjects(_) => "subjects",
            Predicate::Media(_) => "media",
            Predicate::Authors(_) => "authors",
            Predicate::Publishers(_) => "publishers",
            Predicate::Fiction(_) => "fiction",
            Predicate::PublishedWithin(_) => "date_range",
        }
    }
}

// ---------------------------------------------------------------------------
// FilteredView
// ---------------------------------------------------------------------------

/// Read-only subset of a [`RecordStore`], as positions into the store.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    store: &'a RecordStore,
    rows: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// View over every record in the store.
    pub fn all(store: &'a RecordStore) -> Self {
        Self {
            store,
            rows: (0..store.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Store positions of the retained records, ascending.
    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.store.records();
        self.rows.iter().map(move |&i| &records[i])
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Evaluate `spec` against `store`.
pub fn apply<'a>(store: &'a RecordStore, spec: &FilterSpec) -> AnalyticsResult<FilteredView<'a>> {
    spec.validate()?;
    let predicates = spec.predicates();
    let view = apply_predicates(store, &predicates);
    let dimensions: Vec<&str> = predicates.iter().map(Predicate::name).collect();
    debug!(
        active = predicates.len(),
        ?dimensions,
        matched = view.len(),
        total = store.len(),
        "Applied filter spec"
    );
    Ok(view)
}

/// Keep the records satisfying every predicate. The order of `predicates`
/// does not affect the result.
pub fn apply_predicates<'a>(store: &'a RecordStore, predicates: &[Predicate<'_>]) -> FilteredView<'a> {
    if predicates.is_empty() {
        return FilteredView::all(store);
    }
    let rows = store
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| predicates.iter().all(|p| p.matches(record)))
        .map(|(idx, _)| idx)
        .collect();
    FilteredView { store, rows }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
