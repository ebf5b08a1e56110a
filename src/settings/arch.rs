//! CPU architecture types for installer targets.

/// CPU architecture for an installer payload.
///
/// Each architecture carries a token used in artifact names and a define
/// suffix used to namespace per-architecture symbols handed to the script
/// compiler.
///
/// # Examples
///
/// ```
/// use setupforge::settings::Arch;
///
/// assert_eq!(Arch::X64.token(), "x64");
/// assert_eq!(Arch::Arm64.define_suffix(), "ARM64");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// x86_64 / AMD64 (64-bit) - primary desktop architecture
    X64,
    /// x86 / i686 (32-bit) - legacy 32-bit Intel
    Ia32,
    /// AArch64 / ARM64 (64-bit) - Windows on ARM
    Arm64,
}

impl Arch {
    /// Returns the token used in artifact file names (`x64`, `ia32`, `arm64`).
    pub fn token(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Ia32 => "ia32",
            Arch::Arm64 => "arm64",
        }
    }

    /// Returns the suffix used to namespace per-architecture defines.
    ///
    /// The downstream script expects `APP_64`, `APP_32`, and `APP_ARM64`
    /// slots, so the suffix is not the same as [`Arch::token`].
    pub fn define_suffix(self) -> &'static str {
        match self {
            Arch::X64 => "64",
            Arch::Ia32 => "32",
            Arch::Arm64 => "ARM64",
        }
    }

    /// Parses an artifact-name token back into an architecture.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "x64" => Some(Arch::X64),
            "ia32" => Some(Arch::Ia32),
            "arm64" => Some(Arch::Arm64),
            _ => None,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}
