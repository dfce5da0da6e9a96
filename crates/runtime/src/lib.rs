//! Shared runtime plumbing for the Qwen3 ONNX crates.
//!
//! Three concerns live here so the embedding and generation crates agree on them:
//!
//! - **Paths** - find the repository root by walking up to a `models/` directory.
//! - **Providers** - CPU always, CUDA / DirectML when the process can get them.
//! - **Sessions** - build ONNX Runtime sessions, and turn "this GPU is not usable"
//!   into an [`Availability::Unavailable`] value instead of an abort.
//!
//! ```no_run
//! use runtime::{acquire, open_session, ExecutionProvider, ModelPaths, SessionSettings};
//!
//! let paths = ModelPaths::discover()?;
//! let model = paths.embedding_model();
//!
//! let cpu = open_session(&model, ExecutionProvider::Cpu, &SessionSettings::default())?;
//! let gpu = acquire(ExecutionProvider::CUDA_DEFAULT, |p| {
//!     open_session(&model, p, &SessionSettings::accelerated())
//! })?;
//! if !gpu.is_available() {
//!     println!("cuda unavailable: {}", gpu.reason().unwrap_or_default());
//! }
//! # drop(cpu);
//! # Ok::<(), runtime::RuntimeError>(())
//! ```

pub mod error;
pub mod paths;
pub mod provider;
pub mod session;

pub use crate::error::RuntimeError;
pub use crate::paths::{find_repository_root, find_repository_root_from, ModelPaths};
pub use crate::provider::ExecutionProvider;
pub use crate::session::{acquire, open_session, AsRuntimeError, Availability, SessionSettings};

/// Re-exported so downstream crates name the same session type.
pub use ort::session::Session;
