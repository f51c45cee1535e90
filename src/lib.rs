//! A small Rust client for the Lifemapper species distribution modeling (SDM)
//! web services.
//!
//! This crate implements the client side of an SDM experiment:
//! pick an algorithm from the catalog, tune its parameters, validate them
//! against the catalog's declared ranges, then submit the experiment.
//!
//! ## Quick start
//! - Configure the server and credentials via environment variables
//!   (`LMCLIENT_URL`, `LMCLIENT_KEY`) or a `.lmclientrc` file (current directory
//!   or home directory). Without configuration the public server is used
//!   anonymously.
//! - Get an [`AlgorithmInstance`] with [`SdmClient::get_algorithm`], adjust it
//!   with [`AlgorithmInstance::set_parameter`], and submit an
//!   [`ExperimentRequest`] with [`SdmClient::post_experiment`].
//!
//! ```no_run
//! use anyhow::Result;
//! use sdmclient::{ExperimentRequest, SdmClient};
//!
//! fn main() -> Result<()> {
//!     let client = SdmClient::from_env()?;
//!     let mut maxent = client.get_algorithm("ATT_MAXENT")?;
//!     maxent.set_parameter("replicates", 1)?;
//!     maxent.set_parameter("jackknife", 1)?;
//!
//!     let request = ExperimentRequest::new(maxent, 12, 3456)
//!         .with_projection_scenarios([20, 21])
//!         .with_name("Ursus arctos, current and future");
//!     let experiment = client.post_experiment(&request)?;
//!     println!("{}", experiment);
//!     Ok(())
//! }
//! ```
//!
//! Parameter values are only checked when the experiment is validated, so they
//! may be set in any order. Validation stops at the first offending parameter
//! and reports it as an [`SdmError`].

#![forbid(unsafe_code)]

mod algorithm;
mod catalog;
mod client;
mod config;
mod error;
mod experiment;
mod hint;
mod query;
mod util;
mod validate;

pub use algorithm::{
    AlgorithmInstance, AlgorithmParameterSpec, AlgorithmSpec, ParamOption, ParameterInstance,
    ValueType,
};
pub use catalog::AlgorithmCatalog;
pub use client::{ClientConfig, SdmClient};
pub use error::SdmError;
pub use experiment::{AlgorithmChoice, ExperimentRequest};
pub use hint::SearchHit;
pub use query::{ExperimentQuery, ogc_endpoint};
pub use validate::{validate, validate_algorithm};
