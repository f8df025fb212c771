// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fraud news and advisories shown on the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::database::{
    put_json, Database, Page, Pagination, Record, StorageError, StorageResult, NEWS,
};
use crate::models::{limit_text, require_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    Advisory,
    Regulation,
    Enforcement,
    ScamAlert,
    General,
}

impl Default for NewsCategory {
    fn default() -> Self {
        Self::General
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub category: NewsCategory,
    pub published_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for NewsItem {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewNewsItem {
    pub title: String,
    pub summary: String,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: NewsCategory,
    /// Defaults to now.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewNewsItem {
    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title, 300)?;
        require_text("summary", &self.summary, 5_000)?;
        require_text("source", &self.source, 200)?;
        limit_text("url", self.url.as_deref(), 2_000)?;
        if let Some(url) = &self.url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err("url must be an http(s) link".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct NewsFilter {
    pub category: Option<NewsCategory>,
}

pub struct NewsRepository<'a> {
    db: &'a Database,
}

impl<'a> NewsRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Most recently published first.
    pub fn list(&self, filter: &NewsFilter, pagination: Pagination) -> StorageResult<Page<NewsItem>> {
        let mut rows: Vec<NewsItem> = self.db.fetch_all(NEWS)?;
        rows.retain(|n| filter.category.is_none_or(|c| n.category == c));
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn create(&self, author: Option<&str>, new: NewNewsItem) -> StorageResult<NewsItem> {
        new.validate().map_err(StorageError::Validation)?;
        let now = Utc::now();
        let item = NewsItem {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            summary: new.summary,
            source: new.source.trim().to_string(),
            url: new.url,
            category: new.category,
            published_at: new.published_at.unwrap_or(now),
            created_by: author.map(str::to_string),
            created_at: now,
        };
        self.db.write(|txn| put_json(txn, NEWS, &item))?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(title: &str, published_at: DateTime<Utc>) -> NewNewsItem {
        NewNewsItem {
            title: title.into(),
            summary: "Summary".into(),
            source: "CERT-In".into(),
            url: Some("https://example.org/advisory".into()),
            category: NewsCategory::Advisory,
            published_at: Some(published_at),
        }
    }

    #[test]
    fn newest_first_and_filtered() {
        let db = Database::in_memory().unwrap();
        let repo = NewsRepository::new(&db);
        let now = Utc::now();
        repo.create(None, item("old", now - Duration::days(2))).unwrap();
        repo.create(None, item("new", now)).unwrap();

        let page = repo.list(&NewsFilter::default(), Pagination::default()).unwrap();
        assert_eq!(page.items[0].title, "new");

        let filter = NewsFilter {
            category: Some(NewsCategory::ScamAlert),
        };
        assert_eq!(repo.list(&filter, Pagination::default()).unwrap().total, 0);
    }

    #[test]
    fn rejects_non_http_links() {
        let db = Database::in_memory().unwrap();
        let mut bad = item("x", Utc::now());
        bad.url = Some("javascript:alert(1)".into());
        assert!(matches!(
            NewsRepository::new(&db).create(None, bad),
            Err(StorageError::Validation(_))
        ));
    }
}
