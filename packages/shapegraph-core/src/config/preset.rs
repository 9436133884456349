//! Analysis presets
//!
//! A preset fixes the modeling policies; the allocator name lists and
//! numeric defaults are shared by all of them.
//!
//! ```text
//!            unknown calls   symbolic sizes   failure successors   split bound
//! fast       assume safe     guess size       -                    4
//! balanced   assume safe     solver split     -                    16
//! thorough   strict          solver split     malloc, atexit       64
//! custom     assume safe     solver split     -                    16
//! ```
//!
//! `custom` starts without safe-function patterns and is meant to be
//! completed through YAML overrides.

use super::error::ConfigError;
use super::smg_options::{SymbolicSizeHandling, UnknownFunctionHandling};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Screening: sizes are guessed, unknown pointers are not reported
    Fast,
    /// Solver splits on symbolic sizes, leak checking
    #[default]
    Balanced,
    /// Strict unknown calls, failure successors, predicate tracking
    Thorough,
    Custom,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Balanced => "balanced",
            Preset::Thorough => "thorough",
            Preset::Custom => "custom",
        }
    }

    pub fn unknown_function_handling(self) -> UnknownFunctionHandling {
        match self {
            Preset::Thorough => UnknownFunctionHandling::Strict,
            _ => UnknownFunctionHandling::AssumeSafe,
        }
    }

    pub fn symbolic_size_handling(self) -> SymbolicSizeHandling {
        match self {
            Preset::Fast => SymbolicSizeHandling::GuessSize,
            _ => SymbolicSizeHandling::SolverSplit,
        }
    }

    /// Bound on concrete models enumerated for one symbolic memset/memcpy size
    pub fn max_symbolic_assignments(self) -> usize {
        match self {
            Preset::Fast => 4,
            Preset::Thorough => 64,
            Preset::Balanced | Preset::Custom => 16,
        }
    }

    /// malloc returning NULL and atexit failing are explored as successors
    pub fn models_call_failures(self) -> bool {
        self == Preset::Thorough
    }

    /// Imprecision is tolerated: no precise reads, unknown dereferences
    /// are not reported
    pub fn is_lenient(self) -> bool {
        self == Preset::Fast
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_names_roundtrip() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
        assert_eq!("THOROUGH".parse::<Preset>().unwrap(), Preset::Thorough);
        assert!(matches!(
            "paranoid".parse::<Preset>(),
            Err(ConfigError::UnknownPreset(name)) if name == "paranoid"
        ));
    }

    #[test]
    fn test_only_thorough_is_strict() {
        for preset in Preset::ALL {
            let strict = preset.unknown_function_handling() == UnknownFunctionHandling::Strict;
            assert_eq!(strict, preset == Preset::Thorough);
            assert_eq!(preset.models_call_failures(), strict);
        }
    }

    #[test]
    fn test_split_bound_grows_with_precision() {
        assert!(Preset::Fast.max_symbolic_assignments() < Preset::Balanced.max_symbolic_assignments());
        assert!(Preset::Balanced.max_symbolic_assignments() < Preset::Thorough.max_symbolic_assignments());
        assert_eq!(Preset::default(), Preset::Balanced);
    }
}
