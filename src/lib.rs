//! # tdlpack
//!
//! Reader and writer for TDLPACK archives, the legacy binary container for
//! gridded and station-based forecast records, with:
//! - Decoding/encoding of the 4-word decimal-packed record identifier
//! - One-pass indexing of sequential and random-access archives
//! - Lazy, thread-safe payload access
//! - Assembly of flat records into dense, labeled N-dimensional arrays
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dataset                               │
//! │           (open, variables, read, write_to)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Cube Assembly Engine                         │
//! │        (group, read_block, write_block, shared Cube)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Archive   │          │   Payload   │
//!   │  (Indexer)  │          │    Codec    │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ Identifier  │
//!   │   Codec     │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod ident;
pub mod codec;
pub mod archive;
pub mod cube;
pub mod dataset;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TdlpackError};
pub use config::{Config, RaTemplate};
pub use archive::{Archive, ArchiveWriter, Layout, OpenMode, Record, RecordKind};
pub use codec::{PayloadCodec, ScaledIntegerCodec};
pub use dataset::Dataset;
pub use ident::{IdField, Identifier, IdentifierFields};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tdlpack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
