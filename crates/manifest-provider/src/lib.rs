//! Validation, type resolution and planning of raw Kubernetes manifests for
//! hosts which only understand statically typed resources.
//!
//! The [`ProviderServer`](server::ProviderServer) is the surface used by the
//! host. It combines
//!
//! - the OpenAPI [`Foundry`](manifest_openapi::Foundry), which turns the schema
//!   of a kind into a static [`Type`](manifest_morph::Type),
//! - the [`ResourceResolver`](resolver::ResourceResolver), which asks the
//!   Kubernetes API server which resource a kind is served as and whether it
//!   is namespaced, and
//! - the structural checks of the [`validation`] module.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use manifest_provider::{
//!     config::ProviderOptions, logging::initialize_logging, server::ProviderServer,
//! };
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[clap(flatten)]
//!     options: ProviderOptions,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cli = Cli::parse();
//! initialize_logging("manifest-provider", &cli.options.logging)?;
//!
//! let client = kube::Client::try_default().await?;
//! let _server = ProviderServer::connect(client, &cli.options).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod identity;
pub mod logging;
pub mod resolver;
pub mod server;
pub mod validation;

pub use manifest_morph as morph;
pub use manifest_openapi as openapi;
