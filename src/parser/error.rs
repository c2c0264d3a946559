use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    #[error("<{element}> is missing the {attribute:?} attribute")]
    MissingAttribute { element: String, attribute: String },
}
