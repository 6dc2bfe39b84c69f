//! # protofix - schema compiler driver and generated-source fixer
//!
//! Runs an external protobuf compiler over a list of `.proto` files, then
//! rewrites the generated Swift so value-type messages become reference types
//! deriving from a common base class (`NSObject` by default):
//!
//! ```text
//!   struct Foo {                        class Foo : NSObject {
//!     mutating func bar() {}     ──►      func bar() {}
//!     init() {}                           public override init() {}
//!   }                                   }
//! ```
//!
//! - [`driver`]: one compiler invocation per input, in order, with retry and timeout
//! - [`rewrite`]: ordered, named, versioned regex rule sets
//! - [`postprocess`]: directory walk and atomic in-place rewrite of generated files
//! - [`pipeline`]: both stages plus the operator transcript
//! - [`report`]: per-item outcomes and the run's exit status

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod driver;
pub mod pipeline;
pub mod postprocess;
pub mod report;
pub mod rewrite;
pub mod types;

// Internal utilities
pub mod observability;
pub mod validation;

pub use pipeline::Pipeline;
pub use types::{Config, Error, Result};
