//! # skiff-runtime
//!
//! Navigation stack manager, transition protocol and lifecycle router of a
//! mini-program runtime split between one orchestrator and many renderer
//! contexts.
//!
//! - **Handles**: a page ([`SimpleHandle`]) or a tab group ([`TabGroupHandle`])
//!   behind one [`RendererHandle`] enum
//! - **Stack**: ordered handles with push/pop/replace/seek and bulk teardown
//! - **Navigator**: the five verbs, serialized by one async gate; waits for
//!   `rendered`/`onShowed` completions of the active page where needed
//! - **Router**: the only caller of user hooks; enforces show-after-load with a
//!   per-context fallback timer and buffers early tab taps
//! - **Orchestrator**: owns all of the above plus the three buses
//! - **Sim**: an in-process [`HostBridge`] for tests and the replay CLI
//!
//! ## Crate Position
//!
//! Depends on: skiff-core, skiff-bus, skiff-settings.
//! Depended on by: the `skiff` binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod handle;
pub mod hooks;
pub mod host;
pub mod navigator;
pub mod orchestrator;
pub mod router;
pub mod signals;
pub mod sim;
pub mod stack;

pub use errors::RuntimeError;
pub use handle::{HandlePhase, HandleStatus, PageSnapshot, RendererHandle, SimpleHandle, TabGroupHandle, Target};
pub use hooks::{AppHooks, ComponentHooks, NoopApp, PageContext, PageHooks, PageNotFound, PageRegistry};
pub use host::{HostBridge, OpenReply, OpenRequest, OpenVerb};
pub use navigator::Navigator;
pub use orchestrator::Orchestrator;
pub use router::LifecycleRouter;
pub use signals::Signal;
pub use sim::{HostCall, SimulatedHost};
pub use stack::NavigationStack;
