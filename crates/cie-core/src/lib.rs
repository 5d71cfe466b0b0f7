//! Entity/edge data model, deterministic identifier minting, configuration and
//! error types shared by every stage of the ingestion pipeline.

pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use error::CieError;
