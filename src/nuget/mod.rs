//! NuGet V3 registry client
//!
//! # Modules
//!
//! - [`server`]: one server bootstrapped from its service index
//! - [`registrations`]: lazily expanded registration index, pages and leaves
//! - [`registry`]: the [`Registry`] seam and the multi-server [`Nuget`] client
//! - [`error`]: registry errors

pub mod error;
pub mod registrations;
pub mod registry;
pub mod server;

pub use error::NugetError;
pub use registrations::{PageLeaves, PublishedVersion, RegistrationIndex, RegistrationLeaf, RegistrationPage};
pub use registry::{Nuget, Registry};
pub use server::{NugetServer, RegistrationsVersion};
