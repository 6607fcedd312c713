//! CPU architecture types and utilities.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CPU architecture of a build target.
///
/// Tokens follow the Go toolchain naming (`GOARCH`), since they are passed
/// straight into the container environment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Architecture {
    /// x86_64 / AMD64 (64-bit)
    #[serde(rename = "amd64")]
    Amd64,
    /// x86 / i686 (32-bit)
    #[serde(rename = "386")]
    I386,
    /// 32-bit ARM
    #[serde(rename = "arm")]
    Arm,
    /// AArch64 / ARM64 (64-bit)
    #[serde(rename = "arm64")]
    Arm64,
}

impl Architecture {
    /// All known architectures
    pub const ALL: [Architecture; 4] = [Self::Amd64, Self::I386, Self::Arm, Self::Arm64];

    /// Go-style token, e.g. `"amd64"`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::I386 => "386",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
        }
    }

    /// Architecture of the machine running this process.
    ///
    /// Unknown hosts are treated as amd64, the architecture the default
    /// images are published for.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Self::Arm64,
            "x86" => Self::I386,
            "arm" => Self::Arm,
            _ => Self::Amd64,
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "amd64" | "x86_64" => Ok(Self::Amd64),
            "386" | "i386" => Ok(Self::I386),
            "arm" => Ok(Self::Arm),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            other => Err(format!(
                "unknown architecture {:?} (known: amd64, 386, arm, arm64)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip_through_from_str() {
        for arch in Architecture::ALL {
            assert_eq!(arch.as_str().parse::<Architecture>(), Ok(arch));
        }
    }

    #[test]
    fn test_rust_aliases() {
        assert_eq!("aarch64".parse(), Ok(Architecture::Arm64));
        assert_eq!("x86_64".parse(), Ok(Architecture::Amd64));
        assert!("sparc64".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_serde_uses_go_tokens() {
        assert_eq!(
            serde_json::to_string(&Architecture::I386).unwrap(),
            "\"386\""
        );
        let arch: Architecture = serde_json::from_str("\"arm64\"").unwrap();
        assert_eq!(arch, Architecture::Arm64);
    }
}
