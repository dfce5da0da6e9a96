//! ONNX Runtime session construction.
//!
//! Every session is an owned value. Dropping one releases its native resources
//! and never touches another session, so a CPU and a GPU session built from the
//! same model file can coexist and fail independently.

use once_cell::sync::OnceCell;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, DirectMLExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::paths::require_existing;
use crate::{ExecutionProvider, RuntimeError};

static ORT_ENV: OnceCell<()> = OnceCell::new();

/// Knobs applied to every session we build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Intra-op thread count; `None` lets ONNX Runtime decide.
    #[serde(default)]
    pub intra_threads: Option<usize>,
    /// Enable ONNX Runtime's memory pattern optimisation.
    #[serde(default = "default_true")]
    pub memory_pattern: bool,
    /// Use the CPU arena allocator. Disabled for accelerator sessions.
    #[serde(default = "default_true")]
    pub cpu_arena: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            intra_threads: None,
            memory_pattern: true,
            cpu_arena: true,
        }
    }
}

impl SessionSettings {
    /// Settings used for accelerator sessions: memory pattern on, CPU arena off.
    pub fn accelerated() -> Self {
        Self {
            intra_threads: None,
            memory_pattern: true,
            cpu_arena: false,
        }
    }

    pub fn for_provider(provider: ExecutionProvider) -> Self {
        if provider.is_accelerator() {
            Self::accelerated()
        } else {
            Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}

/// Names the process-wide ONNX Runtime environment once. Later sessions reuse it.
fn ensure_environment() {
    ORT_ENV.get_or_init(|| {
        let _ = ort::init().with_name("qwen3-onnx").commit();
    });
}

fn dispatch_for(provider: ExecutionProvider, settings: &SessionSettings) -> ExecutionProviderDispatch {
    match provider {
        ExecutionProvider::Cpu => CPUExecutionProvider::default()
            .with_arena_allocator(settings.cpu_arena)
            .build(),
        ExecutionProvider::Cuda { device_id } => CUDAExecutionProvider::default()
            .with_device_id(device_id)
            .build()
            .error_on_failure(),
        ExecutionProvider::DirectMl { device_id } => DirectMLExecutionProvider::default()
            .with_device_id(device_id)
            .build()
            .error_on_failure(),
    }
}

/// Opens `model_path` on `provider`.
///
/// A missing model file is reported as [`RuntimeError::ResourceNotFound`] before
/// ONNX Runtime is touched. Failure to register an accelerator is reported as
/// [`RuntimeError::AcceleratorUnavailable`]; ONNX Runtime is told to error
/// instead of silently falling back to CPU.
pub fn open_session(
    model_path: &Path,
    provider: ExecutionProvider,
    settings: &SessionSettings,
) -> Result<Session, RuntimeError> {
    require_existing(model_path)?;
    ensure_environment();

    let accelerator_error = |reason: String| RuntimeError::AcceleratorUnavailable {
        provider: provider.label(),
        reason,
    };

    let mut builder = Session::builder()
        .map_err(|e| RuntimeError::Session(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| RuntimeError::Session(e.to_string()))?
        .with_memory_pattern(settings.memory_pattern)
        .map_err(|e| RuntimeError::Session(e.to_string()))?;

    if let Some(threads) = settings.intra_threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(|e| RuntimeError::Session(e.to_string()))?;
    }

    builder = builder
        .with_execution_providers([dispatch_for(provider, settings)])
        .map_err(|e| {
            if provider.is_accelerator() {
                accelerator_error(e.to_string())
            } else {
                RuntimeError::Session(e.to_string())
            }
        })?;

    debug!(path = %model_path.display(), provider = %provider, "session_build");

    let session = builder.commit_from_file(model_path).map_err(|e| {
        if provider.is_accelerator() {
            accelerator_error(e.to_string())
        } else {
            RuntimeError::Session(e.to_string())
        }
    })?;

    info!(
        path = %model_path.display(),
        provider = %provider,
        inputs = session.inputs.len(),
        outputs = session.outputs.len(),
        "session_ready"
    );
    Ok(session)
}

/// Outcome of opportunistically acquiring a resource on some provider.
#[derive(Debug)]
pub enum Availability<T> {
    Ready(T),
    Unavailable { provider: ExecutionProvider, reason: String },
}

impl<T> Availability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Ready(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Availability::Ready(value) => Some(value),
            Availability::Unavailable { .. } => None,
        }
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Availability::Ready(value) => Some(value),
            Availability::Unavailable { .. } => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Availability::Ready(value) => Some(value),
            Availability::Unavailable { .. } => None,
        }
    }

    /// Why the resource is missing, if it is.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Availability::Ready(_) => None,
            Availability::Unavailable { reason, .. } => Some(reason),
        }
    }
}

/// Runs `load` for `provider` and turns accelerator failures into
/// [`Availability::Unavailable`].
///
/// On CPU every error propagates. On an accelerator, missing files still
/// propagate (they would break the CPU path too) while any runtime failure is
/// downgraded so the rest of the process keeps going.
pub fn acquire<T, E, F>(provider: ExecutionProvider, load: F) -> Result<Availability<T>, E>
where
    F: FnOnce(ExecutionProvider) -> Result<T, E>,
    E: AsRuntimeError,
{
    match load(provider) {
        Ok(value) => Ok(Availability::Ready(value)),
        Err(err) if provider.is_accelerator() && err.downgrades_on_accelerator() => {
            let reason = err.to_string();
            warn!(provider = %provider, error = %reason, "accelerator_unavailable");
            Ok(Availability::Unavailable { provider, reason })
        }
        Err(err) => Err(err),
    }
}

/// Lets [`acquire`] inspect wrapped runtime errors of downstream crates.
pub trait AsRuntimeError: std::fmt::Display {
    fn as_runtime_error(&self) -> Option<&RuntimeError>;

    fn downgrades_on_accelerator(&self) -> bool {
        self.as_runtime_error().is_some_and(|err| {
            err.is_accelerator_unavailable() || matches!(err, RuntimeError::Session(_))
        })
    }
}

impl AsRuntimeError for RuntimeError {
    fn as_runtime_error(&self) -> Option<&RuntimeError> {
        Some(self)
    }
}
