//! # skiff-core
//!
//! Foundation types shared by every skiff crate:
//!
//! - **IDs**: host-assigned [`ContextId`](ids::ContextId), locally generated
//!   [`HandleId`](ids::HandleId) and [`TransitionId`](ids::TransitionId)
//! - **Route config**: the app's declared pages, sub-packages, tab bar and
//!   preload rules ([`config::AppConfig`])
//! - **Paths**: uri splitting and relative path resolution against the top page
//! - **Events**: host protocol events and renderer messages as typed enums
//! - **Errors**: the navigation/host/hook error hierarchy via `thiserror`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod events;
pub mod ids;
pub mod path;
