//! # warden-proto
//!
//! Wire and data model types for the warden directory service.
//!
//! This crate is the shared vocabulary of the workspace:
//!
//! - **Entity / Group**: the two kinds of directory principals
//! - **Capability**: the closed enumeration of privileged operations
//! - **RPC envelopes**: request and response shapes exchanged between
//!   clients and the server
//!
//! Everything here is plain serde-serializable data. Behavior (hook
//! pipelines, authorization, persistence) lives in the other crates.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod capability;
pub mod entity;
pub mod group;
pub mod rpc;

pub use capability::{Capability, UnknownCapability};
pub use entity::{Entity, EntityMeta, REDACTED_SECRET};
pub use group::Group;
pub use rpc::{
    AuthData, ClientInfo, EntityRequest, GroupRequest, PingRequest, Request, Response,
    SearchRequest, TokenRequest, WireCode,
};
