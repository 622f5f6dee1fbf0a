#![warn(missing_docs)]

//! Shared utilities for the causeway workspace.
//!
//! The capability core compiles for native hosts and for
//! `wasm32-unknown-unknown`. Native executors may move futures across
//! threads, so async trait methods carry `Send` (and sometimes `Sync`)
//! bounds there; the single-threaded wasm executor needs none. The
//! [`ConditionalSend`] and [`ConditionalSync`] markers expand to the
//! right bound per target, letting signers, verifiers, resolvers and
//! the proof-chain validator declare a single signature for both.

/// `Send` where the target has threads.
///
/// On `wasm32-unknown-unknown` this is a no-op bound; on every other
/// target it is equivalent to `Send`.
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSend: Send {}

#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> ConditionalSend for T {}

/// `Send` where the target has threads.
///
/// On `wasm32-unknown-unknown` this is a no-op bound; on every other
/// target it is equivalent to `Send`.
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSend {}

#[cfg(target_arch = "wasm32")]
impl<T> ConditionalSend for T {}

/// `Send + Sync` where the target has threads.
///
/// On `wasm32-unknown-unknown` this is a no-op bound; on every other
/// target it is equivalent to `Send + Sync`.
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> ConditionalSync for T {}

/// `Send + Sync` where the target has threads.
///
/// On `wasm32-unknown-unknown` this is a no-op bound; on every other
/// target it is equivalent to `Send + Sync`.
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSync {}

#[cfg(target_arch = "wasm32")]
impl<T> ConditionalSync for T {}
