use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RuntimeError;

/// Where a session's kernels execute.
///
/// CPU is always usable. Accelerators are opportunistic: acquiring a session on
/// them may fail at runtime and callers are expected to degrade instead of abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        device_id: i32,
    },
    #[serde(rename = "dml")]
    DirectMl {
        #[serde(default)]
        device_id: i32,
    },
}

impl ExecutionProvider {
    /// CUDA on the first device, the configuration the GPU demos and tests use.
    pub const CUDA_DEFAULT: Self = ExecutionProvider::Cuda { device_id: 0 };

    pub fn is_accelerator(&self) -> bool {
        !matches!(self, ExecutionProvider::Cpu)
    }

    /// Short label used in logs and error messages.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionProvider::Cpu => write!(f, "cpu"),
            ExecutionProvider::Cuda { device_id } => write!(f, "cuda:{device_id}"),
            ExecutionProvider::DirectMl { device_id } => write!(f, "dml:{device_id}"),
        }
    }
}

/// Parses `cpu`, `cuda`, `cuda:1`, `dml`, `dml:0` (case-insensitive).
impl FromStr for ExecutionProvider {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (name, device) = match lowered.split_once(':') {
            Some((name, device)) => (name, Some(device)),
            None => (lowered.as_str(), None),
        };

        let device_id = match device {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| RuntimeError::UnknownProvider(s.to_string()))?,
            None => 0,
        };

        match name {
            "cpu" if device.is_none() => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda { device_id }),
            "dml" | "directml" => Ok(ExecutionProvider::DirectMl { device_id }),
            _ => Err(RuntimeError::UnknownProvider(s.to_string())),
        }
    }
}
