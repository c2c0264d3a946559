pub mod config;
pub mod github;
pub mod http;
pub mod logging;
pub mod nuget;
pub mod parser;
pub mod scan;
pub mod version;
