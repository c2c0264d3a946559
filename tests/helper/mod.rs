#![allow(dead_code)]

pub mod fakes;
pub mod github;
pub mod nuget;

#[allow(unused_imports)]
pub use fakes::{FakeCodeSearch, FakeRegistry};
