use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("Login failed: {0}")]
    Login(#[source] SessionError),

    #[error("Populating didn't complete, failed collections: {}", .failed.join(", "))]
    IncompleteCrawl { failed: Vec<String> },
}

/// Failures reported by the session collaborator.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Couldn't navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No element matches `{0}`")]
    ElementNotFound(String),

    #[error("Invalid locator `{0}`")]
    InvalidLocator(String),

    #[error("Element `{0}` can't be clicked")]
    NotClickable(String),

    #[error("No page is open")]
    NoPage,

    #[error("Session backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Expected structural content is absent from a fetched view.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("The {what} selector `{selector}` matched nothing")]
    MissingElement {
        what: &'static str,
        selector: String,
    },

    #[error("Member count `{0}` holds no number")]
    InvalidCount(String),

    #[error("Member id `{0}` is not an integer")]
    InvalidMemberId(String),

    #[error("Invalid selector `{0}`")]
    InvalidSelector(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

/// Failure while crawling a single collection.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Couldn't open collection {collection}: {source}")]
    Enter {
        collection: String,
        source: SessionError,
    },

    #[error("Couldn't read the member count of {collection}: {source}")]
    Count {
        collection: String,
        source: ExtractionError,
    },

    #[error("Couldn't fetch page {page} of {collection} ({url}): {source}")]
    Fetch {
        collection: String,
        page: u64,
        url: String,
        source: SessionError,
    },

    #[error("Couldn't extract members from page {page} of {collection}: {source}")]
    Page {
        collection: String,
        page: u64,
        source: ExtractionError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CrawlError {
    /// Store failures end the whole run, everything else only the collection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Failure while sending to a single member.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Target of member {member_id} wasn't ready after {waited:?}")]
    NotReadyTimeout { member_id: i64, waited: Duration },

    #[error("Readiness probe failed: {0}")]
    Probe(#[source] SessionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Member {0} has no stored message target")]
    MissingTarget(i64),
}
