//! SDK-style project file parser
//!
//! Reads every `<PackageReference Include="..." Version="..."/>`. The version
//! may also be given as a `<Version>` child element.

use crate::parser::error::ParseError;
use crate::parser::types::Package;
use crate::parser::xml::parse_document;

pub fn parse(content: &str) -> Result<Vec<Package>, ParseError> {
    let root = parse_document(content)?;

    root.descendants("PackageReference")
        .into_iter()
        .map(|reference| {
            let name = reference.required_attribute("Include")?;
            let version = reference
                .attribute("Version")
                .or_else(|| {
                    reference
                        .child("Version")
                        .map(|child| child.text.as_str())
                        .filter(|text| !text.is_empty())
                })
                .map(String::from);
            Ok(Package::new(name, version, None))
        })
        .collect()
}
