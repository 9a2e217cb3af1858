//! Target hardware architecture for generated images.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hardware class an image is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Cpu,
    Gpu,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Cpu => "cpu",
            Architecture::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Architecture::Cpu),
            "gpu" => Ok(Architecture::Gpu),
            other => Err(ConfigError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_architecture() {
        assert_eq!("cpu".parse::<Architecture>().unwrap(), Architecture::Cpu);
        assert_eq!("gpu".parse::<Architecture>().unwrap(), Architecture::Gpu);
        assert_eq!(Architecture::Gpu.to_string(), "gpu");
    }

    #[test]
    fn test_unknown_architecture_is_rejected() {
        for bad in ["", "GPU", "tpu", "arm64", " cpu"] {
            assert!(matches!(
                bad.parse::<Architecture>(),
                Err(ConfigError::UnsupportedArchitecture(_))
            ));
        }
    }
}
