//! # sgcore: structural code analysis and transformation engine
//!
//! A Rust engine that drives an external structural pattern-matcher
//! (ast-grep-shaped: one JSON match per stdout line, single-document rule
//! YAML on stdin) to provide:
//!
//! - **Duplication detection**: MinHash/LSH candidate retrieval plus an
//!   optional AST-normalized and semantic verification stage, coalesced
//!   into DuplicateGroups via union-find.
//! - **Deterministic ranking**: a fixed weighted formula over savings,
//!   complexity, risk, and effort.
//! - **Rule enforcement**: built-in and custom rule sets executed across a
//!   worker pool, producing grouped violations.
//! - **Refactor orchestration**: atomic, multi-file, backed-up, rollback-
//!   capable application of extract/rename/replace-import operations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Analysis Orchestrator                    │
//! ├───────────┬───────────┬────────────┬────────────┬────────────┤
//! │ Executor  │File Gate  │ Similarity │ Duplication│   Ranker   │
//! │(subprocess)│(filter)  │   Kernel   │  Detector  │ (fixed fn) │
//! ├───────────┴───────────┴────────────┴────────────┴────────────┤
//! │   Query Cache   │  Rule Engine  │ Refactor Orchestrator       │
//! │                 │               │   + Backup Store            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Shared error taxonomy, data model, configuration, and process-wide context.
pub mod core;

/// The Executor: subprocess-backed matcher invocation.
pub mod executor;

/// The Query Cache: fingerprinted, TTL+LRU memoization of match lists.
pub mod cache {
    //! Fingerprinted match-list memoization.

    pub mod query_cache;
}

/// The File Gate: deterministic eligible-file enumeration.
pub mod gate;

/// The Similarity Kernel: MinHash/LSH candidate retrieval and hybrid scoring.
pub mod similarity {
    //! MinHash signatures, LSH index, AST-normalized and semantic stages.

    pub mod ast_stage;
    pub mod minhash;
    pub mod semantic_stage;
    pub mod signature_cache;

    pub use minhash::{LshIndex, MinHashSignature};
}

/// The Duplication Detector: construct extraction plus union-find clustering.
pub mod detect;

/// The Ranker: fixed-formula scoring and priority classification.
pub mod rank {
    //! Deterministic scoring formula and score cache.

    pub mod ranker;
    pub mod score_cache;

    pub use ranker::Ranker;
}

/// The Rule Engine: rule resolution, parallel execution, violation grouping.
pub mod rules;

/// The Refactor Orchestrator: atomic multi-file plan application.
pub mod refactor;

/// The Backup Store: content-addressed snapshot/restore.
pub mod backup;

/// The Analysis Orchestrator: end-to-end pipeline with progress callbacks.
pub mod analysis;

/// Host-facing tool surface (one function per external interface in the spec).
pub mod tools;

pub use core::errors::{CoreError, Result};
pub use core::model::{Construct, DuplicateGroup, Match, RankedCandidate, Violation};

/// Library version, exposed for diagnostics and `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
