//! Legacy `packages.config` parser

use crate::parser::error::ParseError;
use crate::parser::types::Package;
use crate::parser::xml::parse_document;

pub fn parse(content: &str) -> Result<Vec<Package>, ParseError> {
    let root = parse_document(content)?;

    root.descendants("package")
        .into_iter()
        .map(|package| {
            let name = package.required_attribute("id")?;
            Ok(Package::new(
                name,
                package.attribute("version").map(String::from),
                package.attribute("targetFramework").map(String::from),
            ))
        })
        .collect()
}
