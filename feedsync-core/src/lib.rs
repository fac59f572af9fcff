#![doc = "feedsync-core: reconciliation engine for supplier product feeds."]

//! This crate contains the full feed-to-catalog reconciliation engine: feed
//! parsing and normalization, variant grouping, catalog matching, mutation
//! execution and the batch pipeline. Everything that talks to the outside
//! world goes through the capability traits in [`contract`].
//!
//! # Usage
//! Construct a [`pipeline::SyncPipeline`] with a concrete catalog client,
//! progress notifier and tracking store, then feed it parsed items or a
//! feed URL.

pub mod config;
pub mod contract;
pub mod error;
pub mod feed;
pub mod group;
pub mod matcher;
pub mod mutation;
pub mod pipeline;
pub mod response;
pub mod stats;
pub mod xml;
