//! # ctorg - configuration tree organiser
//!
//! Builds and tears down project and environment trees of a CloudTruth organization.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `ctorg` deletes things without leaving half a tree behind.
//!
//! ### Terms
//!
//! - projects and environments form trees: a project may depend on a parent project, an
//!   environment may have a parent environment ([resource::Hierarchy])
//! - the service only stores pointers: every node has the url of its parent and the urls of
//!   its direct children ([resource::HierarchicalResource])
//! - some resources own things that are not part of a tree: projects own parameters,
//!   integrations own pull and push actions. Those have to go before their owner and are
//!   called cascade targets
//!
//! ### Talking to the service
//!
//! All remote calls go through [client::ResourceClient]. [http::HttpClient] is the real thing,
//! [memory::MemoryService] keeps a forest in memory and records every call, which is what the
//! tests run against. The connection settings come from the official CLI's `cli.yml`
//! ([profile]).
//!
//! ### Deleting
//!
//! A delete runs in three stages, each returning a plain value:
//!
//! 1. [tree::build_subtree] walks the child pointers from a root and returns every node once,
//!    parents before children. Cycles, shared children and absurd depths end the walk with
//!    [error::Error::MalformedTree].
//! 2. [plan::plan] reverses that order, so every node comes after all of its descendants, and
//!    collects the cascade targets per node. The [plan::ForcePolicy] decides whether a node
//!    with cascade targets may be deleted at all; the plan records that per step.
//! 3. [execute::execute] issues the deletes. A blocked step ends the run before any of its
//!    targets are touched. A failing delete is recorded and the run goes on. "Not found" is
//!    fine. A dry run takes the same path without writing.
//!
//! Integrations are not trees, [integration::plan_integration] builds a single step plan for
//! them and the same executor runs it.
//!
//! [batch] runs the whole thing for one named root or for every root of a kind and keeps
//! going when a single root fails.
//!
//! ### Creating
//!
//! [populate] creates trees of generated names, and parameters inside projects, to have
//! something to delete.
pub mod batch;
pub mod client;
pub mod error;
pub mod execute;
pub mod http;
pub mod integration;
pub mod memory;
pub mod plan;
pub mod populate;
pub mod profile;
pub mod resource;
pub mod tree;
