//! Admin review list: pagination and the draft/commit edit panel.

use crate::submission::{Submission, SubmissionStatus};
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

pub const AVAILABLE_CATEGORIES: [&str; 11] = [
    "Design",
    "Development",
    "Marketing",
    "Finance",
    "HR",
    "Security",
    "Training",
    "IT",
    "Infrastructure",
    "Customer Service",
    "Analytics",
];

pub const AVAILABLE_TAGS: [&str; 23] = [
    "urgent",
    "frontend",
    "ui-ux",
    "campaign",
    "social-media",
    "email",
    "feature",
    "accessibility",
    "ui",
    "budget",
    "hiring",
    "security",
    "audit",
    "critical",
    "training",
    "development",
    "employees",
    "infrastructure",
    "servers",
    "performance",
    "feedback",
    "analytics",
    "customers",
];

/// Portal request types first, then the labels older records carry.
pub const AVAILABLE_REQUEST_TYPES: [&str; 14] = [
    "submit_dataset",
    "request_dataset",
    "report_issue",
    "feedback",
    "Project Proposal",
    "Feature Request",
    "Budget Request",
    "Campaign Request",
    "Audit Report",
    "Training Proposal",
    "Infrastructure Request",
    "Analysis Report",
    "Data Request",
    "Policy Change",
];

/// Option lists offered by the edit panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCatalog {
    pub categories: &'static [&'static str],
    pub tags: &'static [&'static str],
    pub request_types: &'static [&'static str],
}

pub const REVIEW_CATALOG: ReviewCatalog = ReviewCatalog {
    categories: &AVAILABLE_CATEGORIES,
    tags: &AVAILABLE_TAGS,
    request_types: &AVAILABLE_REQUEST_TYPES,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DashboardError {
    #[error("no submission with id {0}")]
    UnknownSubmission(String),
    #[error("{value:?} is not an available {kind}")]
    OutsideCatalog { kind: &'static str, value: String },
}

fn check_option(kind: &'static str, value: &str, allowed: &[&str]) -> Result<(), DashboardError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(DashboardError::OutsideCatalog {
            kind,
            value: value.to_string(),
        })
    }
}

/// Values already on a record stay valid; only additions are checked.
fn check_added(
    kind: &'static str,
    before: &BTreeSet<String>,
    after: &BTreeSet<String>,
    allowed: &[&str],
) -> Result<(), DashboardError> {
    after
        .difference(before)
        .try_for_each(|value| check_option(kind, value, allowed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_size: usize,
}

/// One page of a list plus the "showing a–b of n" summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow<T> {
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    /// 1-based, inclusive. Both are 0 for an empty list.
    pub first: usize,
    pub last: usize,
    pub items: Vec<T>,
}

impl<T> PageWindow<T> {
    pub fn summary(&self) -> String {
        format!("Showing {}–{} of {}", self.first, self.last, self.total)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page_size: 5 }
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, count: usize) -> usize {
        count.div_ceil(self.page_size)
    }

    pub fn clamp(&self, page: usize, count: usize) -> usize {
        page.clamp(1, self.total_pages(count).max(1))
    }

    pub fn previous(&self, page: usize, count: usize) -> usize {
        self.clamp(page.saturating_sub(1), count)
    }

    pub fn next(&self, page: usize, count: usize) -> usize {
        self.clamp(page.saturating_add(1), count)
    }

    pub fn goto(&self, page: usize, count: usize) -> usize {
        self.clamp(page, count)
    }

    fn range(&self, page: usize, count: usize) -> Range<usize> {
        let start = ((page - 1) * self.page_size).min(count);
        start..(start + self.page_size).min(count)
    }

    pub fn window<T: Clone>(&self, items: &[T], page: usize) -> PageWindow<T> {
        let page = self.clamp(page, items.len());
        let range = self.range(page, items.len());
        PageWindow {
            page,
            total_pages: self.total_pages(items.len()),
            total: items.len(),
            first: if range.is_empty() { 0 } else { range.start + 1 },
            last: range.end,
            items: items[range].to_vec(),
        }
    }
}

/// Working copy of one submission. Edits never touch the list until committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    record: Submission,
}

impl Draft {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn record(&self) -> &Submission {
        &self.record
    }

    pub fn set_status(&mut self, status: SubmissionStatus) {
        self.record.status = status;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.record.message = message.into();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.record.title = (!title.trim().is_empty()).then_some(title);
    }

    pub fn set_organization(&mut self, organization: impl Into<String>) {
        self.record.organization = organization.into();
    }

    pub fn set_request_type(&mut self, request_type: impl Into<String>) {
        self.record.request_type = request_type.into();
    }

    pub fn add_category(&mut self, category: &str) -> Result<(), DashboardError> {
        check_option("category", category, &AVAILABLE_CATEGORIES)?;
        self.record.categories.insert(category.to_string());
        Ok(())
    }

    pub fn remove_category(&mut self, category: &str) {
        self.record.categories.remove(category);
    }

    pub fn add_tag(&mut self, tag: &str) -> Result<(), DashboardError> {
        check_option("tag", tag, &AVAILABLE_TAGS)?;
        self.record.tags.insert(tag.to_string());
        Ok(())
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.record.tags.remove(tag);
    }

    /// Replaces the whole working copy, keeping the id it was opened with.
    pub fn replace(&mut self, mut record: Submission) {
        record.id = self.record.id.clone();
        self.record = record;
    }
}

impl From<Submission> for Draft {
    fn from(record: Submission) -> Self {
        Self { record }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    submissions: Vec<Submission>,
    pagination: Pagination,
    page: usize,
    open_id: Option<String>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(Pagination::default())
    }
}

impl Dashboard {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            submissions: Vec::new(),
            pagination,
            page: 1,
            open_id: None,
        }
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn replace_all(&mut self, submissions: Vec<Submission>) {
        self.submissions = submissions;
        self.page = self.pagination.clamp(self.page, self.submissions.len());
        let stale = self
            .open_id
            .as_deref()
            .is_some_and(|id| self.find(id).is_none());
        if stale {
            self.open_id = None;
        }
    }

    pub fn goto(&mut self, page: usize) -> usize {
        self.page = self.pagination.goto(page, self.submissions.len());
        self.page
    }

    pub fn previous(&mut self) -> usize {
        self.page = self.pagination.previous(self.page, self.submissions.len());
        self.page
    }

    pub fn next(&mut self) -> usize {
        self.page = self.pagination.next(self.page, self.submissions.len());
        self.page
    }

    pub fn current_window(&self) -> PageWindow<Submission> {
        self.pagination.window(&self.submissions, self.page)
    }

    pub fn get(&self, id: &str) -> Option<&Submission> {
        self.find(id).map(|index| &self.submissions[index])
    }

    pub fn open_id(&self) -> Option<&str> {
        self.open_id.as_deref()
    }

    /// Opens the detail panel with a snapshot of the record.
    pub fn open(&mut self, id: &str) -> Result<Draft, DashboardError> {
        let record = self
            .get(id)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownSubmission(id.to_string()))?;
        self.open_id = Some(record.id.clone());
        Ok(Draft::from(record))
    }

    /// Replaces the record with the draft's id and closes the panel.
    /// Categories and tags the draft adds must come from the review catalog.
    pub fn commit(&mut self, draft: Draft) -> Result<&Submission, DashboardError> {
        let index = self
            .find(draft.id())
            .ok_or_else(|| DashboardError::UnknownSubmission(draft.id().to_string()))?;
        let current = &self.submissions[index];
        check_added(
            "category",
            &current.categories,
            &draft.record.categories,
            &AVAILABLE_CATEGORIES,
        )?;
        check_added("tag", &current.tags, &draft.record.tags, &AVAILABLE_TAGS)?;
        self.submissions[index] = draft.record;
        self.open_id = None;
        Ok(&self.submissions[index])
    }

    pub fn cancel(&mut self) {
        self.open_id = None;
    }

    fn find(&self, id: &str) -> Option<usize> {
        self.submissions.iter().position(|s| s.id == id)
    }
}
