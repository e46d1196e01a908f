//! Bundle file access.
//!
//! A [`BundleSource`] opens bundle files by path and a [`BundlePool`] keeps a
//! bounded number of them open, each as a [`BundleHandle`] holding the
//! decoded tile index.

mod pool;
mod source;

pub use pool::{BundleHandle, BundlePool, DEFAULT_POOL_CAPACITY};
pub use source::{BundleSource, FsBundleSource};
