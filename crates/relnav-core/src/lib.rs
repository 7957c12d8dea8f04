//! Core types and traits for relnav.
//!
//! `relnav-core` is the **contract layer** for the relnav workspace. It defines
//! the types and traits every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Session facade**: [`Session`] is the trait a database driver implements;
//!   the loader never sees a connection, only this facade.
//! - **Capability descriptor**: [`Dialect`] tells the loader which SQL
//!   constructs a backend accepts (limit suffix, inline views, `row_number()`),
//!   so statement building can degrade gracefully instead of guessing.
//! - **Data model**: [`Table`], [`Association`], and [`DataModel`] are the
//!   read-only association graph the browser navigates.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync
//!   so every database operation is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `relnav-loader` consumes [`Session`], [`Dialect`], and the data model to
//!   build and execute block queries.
//! - `relnav-jobs` drives [`Session::ping`]/[`Session::reconnect`] for its
//!   retry policy.
//! - Driver crates (`relnav-mem`, and any real backend) implement [`Session`].
//!
//! Most applications should use the `relnav` facade; reach for `relnav-core`
//! directly when writing drivers.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod cancel;
pub mod dialect;
pub mod error;
pub mod model;
pub mod row;
pub mod session;
pub mod value;

pub use cancel::CancellationToken;
pub use dialect::{Dialect, InlineViewStyle};
pub use error::{ConnectionError, ConnectionErrorKind, Error, Result, SqlError};
pub use model::{
    Association, AssociationDef, AssociationId, Cardinality, Column, DataModel, Table,
};
pub use row::SqlRow;
pub use session::{CollectSink, RowSink, Session};
pub use value::Value;
