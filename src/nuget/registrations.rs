//! Registration index resource: index → pages → leaves
//!
//! Pages are ordered oldest to newest and so are the leaves inside a page.
//! Large packages ship their pages collapsed (no `items`); those are fetched
//! through the memoized client on first access.

use std::borrow::Cow;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::http::{HttpClient, RequestOptions};
use crate::nuget::error::NugetError;
use crate::version::{is_full_release, is_newer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub listed: Option<bool>,
}

/// One published version of a package
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationLeaf {
    #[serde(rename = "@id")]
    pub url: String,
    pub catalog_entry: CatalogEntry,
    #[serde(default)]
    pub commit_time_stamp: Option<String>,
}

impl RegistrationLeaf {
    pub fn version(&self) -> &str {
        &self.catalog_entry.version
    }

    /// Date part of the commit timestamp
    pub fn commit_date(&self) -> Option<NaiveDate> {
        self.commit_time_stamp.as_deref().and_then(date_from_timestamp)
    }
}

/// `2019-11-09T01:27:30.724Z` → 2019-11-09
fn date_from_timestamp(timestamp: &str) -> Option<NaiveDate> {
    let date = timestamp.split('T').next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLeaves {
    /// Leaves live behind the page URL
    Collapsed { url: String },
    Expanded(Vec<RegistrationLeaf>),
}

#[derive(Debug, Deserialize)]
struct PageDocument {
    #[serde(rename = "@id", default)]
    url: Option<String>,
    count: u64,
    lower: String,
    upper: String,
    #[serde(default)]
    items: Vec<RegistrationLeaf>,
}

/// A contiguous version range `lower..=upper` of a registration index
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "PageDocument")]
pub struct RegistrationPage {
    pub count: u64,
    pub lower: String,
    pub upper: String,
    pub leaves: PageLeaves,
}

impl From<PageDocument> for RegistrationPage {
    fn from(document: PageDocument) -> Self {
        let leaves = match document.url {
            Some(url) if document.items.is_empty() => PageLeaves::Collapsed { url },
            _ => PageLeaves::Expanded(document.items),
        };
        Self {
            count: document.count,
            lower: document.lower,
            upper: document.upper,
            leaves,
        }
    }
}

impl RegistrationPage {
    /// Leaves of this page, fetching the page document when collapsed.
    ///
    /// A page that cannot be found expands to no leaves.
    pub async fn leaves(
        &self,
        http: &HttpClient,
    ) -> Result<Cow<'_, [RegistrationLeaf]>, NugetError> {
        match &self.leaves {
            PageLeaves::Expanded(leaves) => Ok(Cow::Borrowed(leaves.as_slice())),
            PageLeaves::Collapsed { url } => {
                let page: Option<PageDocument> =
                    http.get_json(url, &RequestOptions::default()).await?;
                Ok(Cow::Owned(page.map(|page| page.items).unwrap_or_default()))
            }
        }
    }
}

/// A version together with the date it was published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub version: String,
    pub date: Option<NaiveDate>,
}

impl From<&RegistrationLeaf> for PublishedVersion {
    fn from(leaf: &RegistrationLeaf) -> Self {
        Self {
            version: leaf.version().to_string(),
            date: leaf.commit_date(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationIndex {
    /// Where the index was fetched from; filled in after decoding
    #[serde(skip)]
    pub url: String,
    pub count: u64,
    #[serde(rename = "items")]
    pub pages: Vec<RegistrationPage>,
}

impl RegistrationIndex {
    /// Total number of versions, from the page summaries
    pub fn available_version_count(&self) -> u64 {
        self.pages.iter().map(|page| page.count).sum()
    }

    /// Publish date of exactly `version`.
    ///
    /// Pages whose upper bound is older than `version` are not expanded.
    pub async fn version_date(
        &self,
        http: &HttpClient,
        version: &str,
    ) -> Result<Option<NaiveDate>, NugetError> {
        for page in &self.pages {
            if is_newer(&page.upper, version)? {
                continue;
            }
            for leaf in page.leaves(http).await?.iter() {
                if leaf.version() == version {
                    if let Some(date) = leaf.commit_date() {
                        return Ok(Some(date));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Newest version of any kind
    pub async fn latest_version(
        &self,
        http: &HttpClient,
    ) -> Result<Option<PublishedVersion>, NugetError> {
        self.find_latest(http, |_| true).await
    }

    /// Newest version without prerelease or build metadata
    pub async fn latest_release(
        &self,
        http: &HttpClient,
    ) -> Result<Option<PublishedVersion>, NugetError> {
        self.find_latest(http, |leaf| matches!(is_full_release(leaf.version()), Ok(true)))
            .await
    }

    async fn find_latest<F>(
        &self,
        http: &HttpClient,
        accept: F,
    ) -> Result<Option<PublishedVersion>, NugetError>
    where
        F: Fn(&RegistrationLeaf) -> bool,
    {
        for page in self.pages.iter().rev() {
            let leaves = page.leaves(http).await?;
            if let Some(leaf) = leaves.iter().rev().find(|leaf| accept(leaf)) {
                return Ok(Some(leaf.into()));
            }
        }
        Ok(None)
    }
}
