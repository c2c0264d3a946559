//! A single NuGet V3 server, bootstrapped from its service index

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::http::{HttpClient, RequestOptions};
use crate::nuget::error::NugetError;
use crate::nuget::registrations::RegistrationIndex;

const PACKAGE_DETAILS_URI_TEMPLATE: &str = "PackageDetailsUriTemplate/5.1.0";

/// Flavours of the registration base URL advertised in a service index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationsVersion {
    Release,
    Beta,
    ReleaseCandidate,
    V3_4_0,
    V3_6_0,
}

impl RegistrationsVersion {
    pub const ALL: [RegistrationsVersion; 5] = [
        RegistrationsVersion::Release,
        RegistrationsVersion::Beta,
        RegistrationsVersion::ReleaseCandidate,
        RegistrationsVersion::V3_4_0,
        RegistrationsVersion::V3_6_0,
    ];

    /// `@type` of the matching service index resource
    pub fn resource_type(&self) -> &'static str {
        match self {
            RegistrationsVersion::Release => "RegistrationsBaseUrl",
            RegistrationsVersion::Beta => "RegistrationsBaseUrl/3.0.0-beta",
            RegistrationsVersion::ReleaseCandidate => "RegistrationsBaseUrl/3.0.0-rc",
            RegistrationsVersion::V3_4_0 => "RegistrationsBaseUrl/3.4.0",
            RegistrationsVersion::V3_6_0 => "RegistrationsBaseUrl/3.6.0",
        }
    }

    fn from_resource_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|version| version.resource_type() == resource_type)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    resource_type: String,
}

#[derive(Debug)]
pub struct NugetServer {
    index_url: String,
    base_urls: HashMap<RegistrationsVersion, String>,
    details_template: Option<String>,
    http: Arc<HttpClient>,
}

impl NugetServer {
    /// Fetch the service index at `service_index_url` and read its resources
    pub async fn create(http: Arc<HttpClient>, service_index_url: &str) -> Result<Self, NugetError> {
        let invalid = |reason: &str| NugetError::ServiceIndex {
            url: service_index_url.to_string(),
            reason: reason.to_string(),
        };

        let index: ServiceIndex = http
            .get_json(service_index_url, &RequestOptions::default())
            .await?
            .ok_or_else(|| invalid("not found"))?;
        if index.resources.is_empty() {
            return Err(invalid("no resources advertised"));
        }

        let mut base_urls = HashMap::new();
        let mut details_template = None;
        for resource in index.resources {
            if let Some(version) = RegistrationsVersion::from_resource_type(&resource.resource_type)
            {
                base_urls.entry(version).or_insert(resource.id);
            } else if resource.resource_type == PACKAGE_DETAILS_URI_TEMPLATE {
                details_template.get_or_insert(resource.id);
            }
        }

        if !base_urls.contains_key(&RegistrationsVersion::Release) {
            return Err(invalid("no RegistrationsBaseUrl resource"));
        }
        debug!(
            "Service index {} advertises {} registration base(s)",
            service_index_url,
            base_urls.len()
        );

        Ok(Self {
            index_url: service_index_url.to_string(),
            base_urls,
            details_template,
            http,
        })
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    pub fn base_url(&self, version: RegistrationsVersion) -> Option<&str> {
        self.base_urls.get(&version).map(String::as_str)
    }

    /// Package page template with `{id}` and `{version}` placeholders
    pub fn details_template(&self) -> Option<&str> {
        self.details_template.as_deref()
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// `{base}{id}/index.json` with the id lowercased
    pub fn registration_index_url(&self, version: RegistrationsVersion, id: &str) -> Option<String> {
        let base = self.base_url(version)?;
        let separator = if base.ends_with('/') { "" } else { "/" };
        Some(format!(
            "{}{}{}/index.json",
            base,
            separator,
            id.to_lowercase()
        ))
    }

    /// Registration index of `id` from the release base, `None` when the
    /// server does not know the package
    pub async fn registration_index(&self, id: &str) -> Result<Option<RegistrationIndex>, NugetError> {
        self.registration_index_for(RegistrationsVersion::Release, id)
            .await
    }

    pub async fn registration_index_for(
        &self,
        version: RegistrationsVersion,
        id: &str,
    ) -> Result<Option<RegistrationIndex>, NugetError> {
        let Some(url) = self.registration_index_url(version, id) else {
            return Ok(None);
        };

        let index: Option<RegistrationIndex> =
            self.http.get_json(&url, &RequestOptions::default()).await?;
        Ok(index.map(|mut index| {
            index.url = url;
            index
        }))
    }
}
