use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sysinfo::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Osx,
    Linux,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X86_64,
    Arm,
    Arm64,
    Unknown,
}

/// Operating system and CPU architecture that core files are selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os:   Os,
    pub arch: Arch,
}

static CURRENT: Lazy<Platform> = Lazy::new(|| Platform {
    os:   detect_os(),
    arch: detect_arch(),
});

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self { Self { os, arch } }

    /// The host platform, detected once per process.
    pub fn current() -> Self { *CURRENT }
}

impl Os {
    /// Name used by launcher metadata rules and native classifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Osx => "osx",
            Os::Linux => "linux",
            Os::Unknown => "unknown",
        }
    }
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

fn detect_os() -> Os {
    match std::env::consts::OS {
        "windows" => Os::Windows,
        "macos" => Os::Osx,
        "linux" => Os::Linux,
        _ => Os::Unknown,
    }
}

// The running CPU, not the compile target: an x86_64 build under
// translation still reports the host architecture.
fn detect_arch() -> Arch { parse_arch(&System::cpu_arch()) }

fn parse_arch(name: &str) -> Arch {
    match name {
        "i386" | "i686" | "x86" => Arch::X86,
        "x86_64" | "amd64" => Arch::X86_64,
        "arm" | "armv7l" => Arch::Arm,
        "aarch64" | "arm64" => Arch::Arm64,
        _ => Arch::Unknown,
    }
}
