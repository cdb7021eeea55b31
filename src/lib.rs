//! # docask
//!
//! Ask questions about a single document, grounded by local retrieval.
//!
//! docask splits a document into overlapping chunks, ranks them against the
//! question with TF-IDF similarity, merges the nearby winners into a context
//! block, and sends context plus question to an OpenAI-compatible chat
//! completion endpoint. The streamed reply is decoded incrementally into a
//! single answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────────┐   ┌──────────┐
//! │ Document │──▶│  Retriever               │──▶│  Prompt   │
//! │ .md/.pdf │   │ Chunk → Rank → Merge    │   │ context  │
//! └──────────┘   │ (keyword or hybrid)     │   └────┬─────┘
//!                └─────────────────────────┘        │
//!                                                   ▼
//!                ┌─────────────────────────┐   ┌──────────┐
//!                │  Stream Decoder          │◀──│ Endpoint │
//!                │ SSE / JSON / buffered   │   │ (HTTP)   │
//!                └─────────────────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docask --doc ./manual.md ask "How do I rotate the logs?"
//! docask --doc ./manual.md repl          # interactive loop
//! docask --doc ./manual.md context "log rotation"
//! docask --doc ./manual.md chunks        # chunking statistics
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`document`] | Document loading and fingerprinting |
//! | [`extract`] | PDF/DOCX text extraction |
//! | [`chunk`] | Overlapping window chunker |
//! | [`rank`] | TF-IDF ranking |
//! | [`merge`] | Proximity-based chunk merging |
//! | [`retrieve`] | Retrieval backends (keyword, hybrid) |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`client`] | Chat completion client |
//! | [`stream`] | Response stream decoding |
//! | [`session`] | Query boundary |
//! | [`trace`] | Progress reporting |

pub mod chunk;
pub mod client;
pub mod config;
pub mod document;
pub mod embedding;
pub mod extract;
pub mod merge;
pub mod models;
pub mod rank;
pub mod retrieve;
pub mod session;
pub mod stream;
pub mod trace;
