// SPDX-License-Identifier: MIT OR Apache-2.0
//! Umbrella crate for the scan-orchestration workspace.
//!
//! This crate carries no code of its own; it exists so the workspace root
//! has a buildable target for the root-level integration tests under
//! `tests/`. The actual engine lives in `crates/scanopt-runtime` and its
//! sibling crates — see each crate's own docs for the pipeline it
//! implements.

pub use scanopt_backend as backend;
pub use scanopt_config as config;
pub use scanopt_core as core;
pub use scanopt_download as download;
pub use scanopt_error as error;
pub use scanopt_runtime as runtime;
pub use scanopt_storage as storage;
