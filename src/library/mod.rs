//! Document library.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.paperflow/
//! ├── documents.json            # Catalog of known documents
//! └── cache/
//!     └── <sha256(doc id)[0:16]>/
//!         ├── extraction.v1.json
//!         └── claims.v1.json    # One versioned envelope per stage
//! ```

pub mod catalog;
pub mod samples;

pub use catalog::DocumentCatalog;
pub use samples::{load_sample, parse_sample};
