//! # coref-core
//!
//! Core types shared by the coref crates.
//!
//! This crate provides:
//! - **Spans**: `Mention`, a half-open token interval
//! - **Partitions**: `Cluster` and `MentionClusters`, the output of decoding
//! - **Documents**: `Doc`, `SpanGroups` and `Example` (predicted + reference)
//!
//! The algorithmic crate (`coref`) and the CLI both depend on these types so
//! that clusters written by one component can be read back by another.

#![warn(missing_docs)]

pub mod doc;
pub mod error;
pub mod mention;

pub use doc::{Doc, Example, SpanGroups};
pub use error::{Error, Result};
pub use mention::{Cluster, Mention, MentionClusters, MentionId};
