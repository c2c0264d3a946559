use thiserror::Error;

use crate::http::HttpError;
use crate::version::VersionError;

#[derive(Debug, Error)]
pub enum NugetError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Invalid service index at {url}: {reason}")]
    ServiceIndex { url: String, reason: String },

    #[error(transparent)]
    Version(#[from] VersionError),
}
