//! Closed vocabularies for record classification.
//!
//! Free text pulled from documentation ("C# 9", "net8.0", "EF Core") is
//! resolved through the `parse` functions, which return `None` for anything
//! outside the known set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Documentation category / framework area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Language,
    Aspnet,
    Blazor,
    EfCore,
    Maui,
    MinimalApis,
    Signalr,
    Grpc,
    Mlnet,
    AzureSdk,
    Msbuild,
    Roslyn,
    Nuget,
    Bcl,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::Language,
        Category::Aspnet,
        Category::Blazor,
        Category::EfCore,
        Category::Maui,
        Category::MinimalApis,
        Category::Signalr,
        Category::Grpc,
        Category::Mlnet,
        Category::AzureSdk,
        Category::Msbuild,
        Category::Roslyn,
        Category::Nuget,
        Category::Bcl,
    ];

    /// Stored key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Language => "language",
            Category::Aspnet => "aspnet",
            Category::Blazor => "blazor",
            Category::EfCore => "ef_core",
            Category::Maui => "maui",
            Category::MinimalApis => "minimal_apis",
            Category::Signalr => "signalr",
            Category::Grpc => "grpc",
            Category::Mlnet => "mlnet",
            Category::AzureSdk => "azure_sdk",
            Category::Msbuild => "msbuild",
            Category::Roslyn => "roslyn",
            Category::Nuget => "nuget",
            Category::Bcl => "bcl",
        }
    }

    /// Human-readable framework name used for graph nodes.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Language => "C# Language",
            Category::Aspnet => "ASP.NET Core",
            Category::Blazor => "Blazor",
            Category::EfCore => "Entity Framework Core",
            Category::Maui => ".NET MAUI",
            Category::MinimalApis => "Minimal APIs",
            Category::Signalr => "SignalR",
            Category::Grpc => "gRPC",
            Category::Mlnet => "ML.NET",
            Category::AzureSdk => "Azure SDK",
            Category::Msbuild => "MSBuild",
            Category::Roslyn => "Roslyn",
            Category::Nuget => "NuGet",
            Category::Bcl => "Base Class Library",
        }
    }

    /// Resolve a category from its key, display name, or a common alias.
    pub fn parse(text: &str) -> Option<Self> {
        let wanted = squash(text);
        if wanted.is_empty() {
            return None;
        }

        let alias = match wanted.as_str() {
            "csharp" => Some(Category::Language),
            "entityframework" | "efcore" | "ef" => Some(Category::EfCore),
            "minimalapi" => Some(Category::MinimalApis),
            "azure" => Some(Category::AzureSdk),
            "baseclasslibraries" | "corelib" => Some(Category::Bcl),
            _ => None,
        };

        alias.or_else(|| {
            Self::ALL
                .iter()
                .copied()
                .find(|c| squash(c.as_str()) == wanted || squash(c.display_name()) == wanted)
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// C# language version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LanguageVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "4.0")]
    V4_0,
    #[serde(rename = "5.0")]
    V5_0,
    #[serde(rename = "6.0")]
    V6_0,
    #[serde(rename = "7.0")]
    V7_0,
    #[serde(rename = "7.1")]
    V7_1,
    #[serde(rename = "7.2")]
    V7_2,
    #[serde(rename = "7.3")]
    V7_3,
    #[serde(rename = "8.0")]
    V8_0,
    #[serde(rename = "9.0")]
    V9_0,
    #[serde(rename = "10.0")]
    V10_0,
    #[serde(rename = "11.0")]
    V11_0,
    #[serde(rename = "12.0")]
    V12_0,
    #[serde(rename = "13.0")]
    V13_0,
    #[serde(rename = "14.0")]
    V14_0,
}

impl LanguageVersion {
    /// All versions, oldest first. Consecutive entries form the evolution chain.
    pub const ALL: [LanguageVersion; 18] = [
        LanguageVersion::V1_0,
        LanguageVersion::V1_2,
        LanguageVersion::V2_0,
        LanguageVersion::V3_0,
        LanguageVersion::V4_0,
        LanguageVersion::V5_0,
        LanguageVersion::V6_0,
        LanguageVersion::V7_0,
        LanguageVersion::V7_1,
        LanguageVersion::V7_2,
        LanguageVersion::V7_3,
        LanguageVersion::V8_0,
        LanguageVersion::V9_0,
        LanguageVersion::V10_0,
        LanguageVersion::V11_0,
        LanguageVersion::V12_0,
        LanguageVersion::V13_0,
        LanguageVersion::V14_0,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageVersion::V1_0 => "1.0",
            LanguageVersion::V1_2 => "1.2",
            LanguageVersion::V2_0 => "2.0",
            LanguageVersion::V3_0 => "3.0",
            LanguageVersion::V4_0 => "4.0",
            LanguageVersion::V5_0 => "5.0",
            LanguageVersion::V6_0 => "6.0",
            LanguageVersion::V7_0 => "7.0",
            LanguageVersion::V7_1 => "7.1",
            LanguageVersion::V7_2 => "7.2",
            LanguageVersion::V7_3 => "7.3",
            LanguageVersion::V8_0 => "8.0",
            LanguageVersion::V9_0 => "9.0",
            LanguageVersion::V10_0 => "10.0",
            LanguageVersion::V11_0 => "11.0",
            LanguageVersion::V12_0 => "12.0",
            LanguageVersion::V13_0 => "13.0",
            LanguageVersion::V14_0 => "14.0",
        }
    }

    /// Resolve "9", "9.0", "C# 9", "csharp 10.0", "C# v7.3".
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(v) = Self::ALL.iter().find(|v| v.as_str() == text) {
            return Some(*v);
        }

        let re = cached(&LANGUAGE_PATTERN, r"(?i)^(?:c#|c\s*sharp|c-sharp|csharp)?\s*v?(\d{1,2})(?:\.(\d))?$")?;
        let caps = re.captures(text)?;
        let key = version_key(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))?;

        Self::ALL.iter().copied().find(|v| v.as_str() == key)
    }
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// .NET runtime version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuntimeVersion {
    #[serde(rename = ".NET Framework 1.0")]
    Framework1_0,
    #[serde(rename = ".NET Framework 1.1")]
    Framework1_1,
    #[serde(rename = ".NET Framework 2.0")]
    Framework2_0,
    #[serde(rename = ".NET Framework 3.0")]
    Framework3_0,
    #[serde(rename = ".NET Framework 3.5")]
    Framework3_5,
    #[serde(rename = ".NET Framework 4.0")]
    Framework4_0,
    #[serde(rename = ".NET Framework 4.5")]
    Framework4_5,
    #[serde(rename = ".NET Framework 4.6")]
    Framework4_6,
    #[serde(rename = ".NET Framework 4.7")]
    Framework4_7,
    #[serde(rename = ".NET Framework 4.8")]
    Framework4_8,
    #[serde(rename = ".NET Core 1.0")]
    Core1_0,
    #[serde(rename = ".NET Core 2.0")]
    Core2_0,
    #[serde(rename = ".NET Core 2.1")]
    Core2_1,
    #[serde(rename = ".NET Core 3.0")]
    Core3_0,
    #[serde(rename = ".NET Core 3.1")]
    Core3_1,
    #[serde(rename = ".NET 5.0")]
    Net5_0,
    #[serde(rename = ".NET 6.0")]
    Net6_0,
    #[serde(rename = ".NET 7.0")]
    Net7_0,
    #[serde(rename = ".NET 8.0")]
    Net8_0,
    #[serde(rename = ".NET 9.0")]
    Net9_0,
    #[serde(rename = ".NET 10.0")]
    Net10_0,
}

impl RuntimeVersion {
    pub const ALL: [RuntimeVersion; 21] = [
        RuntimeVersion::Framework1_0,
        RuntimeVersion::Framework1_1,
        RuntimeVersion::Framework2_0,
        RuntimeVersion::Framework3_0,
        RuntimeVersion::Framework3_5,
        RuntimeVersion::Framework4_0,
        RuntimeVersion::Framework4_5,
        RuntimeVersion::Framework4_6,
        RuntimeVersion::Framework4_7,
        RuntimeVersion::Framework4_8,
        RuntimeVersion::Core1_0,
        RuntimeVersion::Core2_0,
        RuntimeVersion::Core2_1,
        RuntimeVersion::Core3_0,
        RuntimeVersion::Core3_1,
        RuntimeVersion::Net5_0,
        RuntimeVersion::Net6_0,
        RuntimeVersion::Net7_0,
        RuntimeVersion::Net8_0,
        RuntimeVersion::Net9_0,
        RuntimeVersion::Net10_0,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeVersion::Framework1_0 => ".NET Framework 1.0",
            RuntimeVersion::Framework1_1 => ".NET Framework 1.1",
            RuntimeVersion::Framework2_0 => ".NET Framework 2.0",
            RuntimeVersion::Framework3_0 => ".NET Framework 3.0",
            RuntimeVersion::Framework3_5 => ".NET Framework 3.5",
            RuntimeVersion::Framework4_0 => ".NET Framework 4.0",
            RuntimeVersion::Framework4_5 => ".NET Framework 4.5",
            RuntimeVersion::Framework4_6 => ".NET Framework 4.6",
            RuntimeVersion::Framework4_7 => ".NET Framework 4.7",
            RuntimeVersion::Framework4_8 => ".NET Framework 4.8",
            RuntimeVersion::Core1_0 => ".NET Core 1.0",
            RuntimeVersion::Core2_0 => ".NET Core 2.0",
            RuntimeVersion::Core2_1 => ".NET Core 2.1",
            RuntimeVersion::Core3_0 => ".NET Core 3.0",
            RuntimeVersion::Core3_1 => ".NET Core 3.1",
            RuntimeVersion::Net5_0 => ".NET 5.0",
            RuntimeVersion::Net6_0 => ".NET 6.0",
            RuntimeVersion::Net7_0 => ".NET 7.0",
            RuntimeVersion::Net8_0 => ".NET 8.0",
            RuntimeVersion::Net9_0 => ".NET 9.0",
            RuntimeVersion::Net10_0 => ".NET 10.0",
        }
    }

    /// Resolve display strings (".NET 8", ".NET Framework 4.8", ".NET Core 3.1")
    /// and target framework monikers ("net8.0", "net48", "netcoreapp3.1").
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(v) = Self::ALL.iter().find(|v| v.as_str().eq_ignore_ascii_case(text)) {
            return Some(*v);
        }

        let key = if let Some(caps) =
            cached(&FRAMEWORK_PATTERN, r"(?i)^\.?net\s*framework\s*(\d)(?:\.(\d))?")?.captures(text)
        {
            format!(".NET Framework {}", version_key(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))?)
        } else if let Some(caps) =
            cached(&CORE_PATTERN, r"(?i)^(?:\.?net\s*core\s*|netcoreapp)(\d)(?:\.(\d))?$")?.captures(text)
        {
            format!(".NET Core {}", version_key(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))?)
        } else if let Some(caps) = cached(&FRAMEWORK_TFM_PATTERN, r"(?i)^net([2-4])(\d)\d?$")?.captures(text) {
            format!(".NET Framework {}", version_key(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))?)
        } else {
            let caps = cached(&MODERN_PATTERN, r"(?i)^\.?net\s*(\d{1,2})(?:\.(\d))?(?:-[a-z]+)?$")?
                .captures(text)?;
            format!(".NET {}", version_key(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))?)
        };

        Self::ALL.iter().copied().find(|v| v.as_str() == key)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compile status reported by the external build validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    #[default]
    Untested,
    Compiles,
    Fails,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Untested => "untested",
            ValidationStatus::Compiles => "compiles",
            ValidationStatus::Fails => "fails",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static LANGUAGE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static FRAMEWORK_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static CORE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static FRAMEWORK_TFM_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static MODERN_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn cached<'a>(slot: &'a OnceLock<Option<Regex>>, pattern: &str) -> Option<&'a Regex> {
    slot.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// "9" + None -> "9.0", "7" + Some("3") -> "7.3".
fn version_key(major: &str, minor: Option<&str>) -> Option<String> {
    let major: u32 = major.parse().ok()?;
    let minor: u32 = match minor {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    Some(format!("{major}.{minor}"))
}

/// Lowercase alphanumerics only, so "ASP.NET Core" and "aspnet_core" compare equal.
fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
