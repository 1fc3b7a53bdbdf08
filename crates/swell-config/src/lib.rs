//! swell-config — configuration model for the Swell autoscaler.
//!
//! A Swell deployment is driven by a collection of JSON entries, one per
//! scalable workload, held in an external configuration store (a
//! ConfigMap in the Kubernetes adapter). This crate defines the common
//! shape of those entries ([`WorkloadConfig`]), the parsing and
//! validation rules that apply to every backend, and the
//! [`ConfigStore`] contract the supervisor and admin UI consume.
//!
//! Backend-specific fields (queue identifiers, credentials,
//! `msgs_per_pod`) are parsed by the control-loop factory; this crate
//! only knows the shape shared by all backends.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{ScaleMethod, WorkloadConfig, parse_interval};
pub use error::{ConfigError, StoreError};
pub use store::{ConfigEvent, ConfigStore};
