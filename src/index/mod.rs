// src/index/mod.rs

//! The generic index layer
//!
//! Indexes are owned by users and typed by a tag (`stage` or `merge`).
//! Type-specific behavior is supplied by a [`StageCustomizer`]; this layer
//! provides configuration handling, permissions, release storage and the
//! request-level operations that tie them together.

pub mod acl;
pub mod config;
pub mod customizer;
pub mod service;
pub mod stage;

pub use acl::{Capability, DEFAULT_ROOT_USER, RequestContext, has_permission};
pub use config::{ConfigPatch, IndexConfig, IndexKind, apply_patch};
pub use customizer::{PlainStage, PolicyEnv, StageCustomizer, StoreEnv, customizer_for};
pub use service::{PushRequest, Upload};
pub use stage::{LinkInfo, ProjectLinks, Stage};
