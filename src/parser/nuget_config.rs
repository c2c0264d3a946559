//! `nuget.config` parser
//!
//! Only `<packageSources>/<add key="name" value="url"/>` entries matter.
//! `<clear/>` and `<remove/>` are ignored; every file is merged into one
//! endpoint list by the caller.

use crate::parser::error::ParseError;
use crate::parser::xml::parse_document;

/// A package source declared in `nuget.config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub name: String,
    pub url: String,
}

pub fn parse(content: &str) -> Result<Vec<PackageSource>, ParseError> {
    let root = parse_document(content)?;
    let mut sources = Vec::new();

    for section in root.descendants("packageSources") {
        for add in section.children.iter().filter(|child| child.name == "add") {
            sources.push(PackageSource {
                name: add.required_attribute("key")?.to_string(),
                url: add.required_attribute("value")?.to_string(),
            });
        }
    }

    Ok(sources)
}
