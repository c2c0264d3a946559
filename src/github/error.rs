use thiserror::Error;

use crate::http::HttpError;
use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("A non-empty GitHub token is required")]
    MissingToken,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}
