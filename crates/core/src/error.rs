//! Failures surfaced to the host.
//!
//! Ordinary out-of-range edits never error; they clamp. What remains are
//! integration defects: a stored id the catalog cannot resolve, or a shared
//! design/tech handle the host dropped while a manager still referenced it.

use thiserror::Error;

use crate::catalog::OptionFamily;

/// Errors raised by the allocation managers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A design or request references an option id missing from the catalog.
    #[error("no {family} option with id `{id}` in the catalog")]
    MissingDescriptor {
        /// Catalog that was searched.
        family: OptionFamily,
        /// Offending id.
        id: String,
    },
    /// The host dropped the unit design this manager edits.
    #[error("unit design is no longer attached to the editor")]
    DesignDetached,
    /// The host dropped the tech context this manager filters against.
    #[error("tech context is no longer attached to the editor")]
    TechContextDetached,
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
