//! finsight-core — domain types and pure logic for the query-safety
//! pipeline.
//!
//! Everything here is side-effect free: the template vocabulary, the
//! SQL allow-list validator, the metric catalog, the alias cache, and
//! the port traits the adapters implement. No I/O happens in this
//! crate.

pub mod alias_cache;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod ports;
pub mod seeds;
pub mod templates;
pub mod types;
pub mod validator;

pub use alias_cache::{AliasCache, AliasSnapshot, ReferenceData};
pub use error::{FinsightError, Result, Stage, TurnError};
pub use templates::{Template, ALLOWED_PARAMS, ALLOWED_SURFACES, LIMIT_CEILING};
pub use types::{
    BoundStatement, Citation, CitationKey, Intent, ParamMap, ParamValue, Period, Plan, ResultSet,
    Row, SessionContext, StatementTrace, Task, ValidationVerdict,
};
