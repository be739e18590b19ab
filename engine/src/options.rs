//! Rendering options and kernel variant identity.

use std::fmt;
use std::str::FromStr;

use hyperorbit_algebra::NumberSystem;

/// Which of `z₀` and `c` is taken from the grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Space {
    /// `z₀` from the cell, `c` is the global parameter.
    #[default]
    Phase,
    /// `z₀` is the global parameter, `c` from the cell.
    Dynamical,
}

/// How a cell's iteration is turned into color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// Smoothed escape time written to the cell's own texel.
    #[default]
    Escape,
    /// Orbit visitation: every iterate is scattered to the texel it maps back to.
    Translated,
}

/// Grid dimensionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Dimensions {
    /// `r × r` image
    #[default]
    Two,
    /// `r × r × r` volume
    Three,
}

impl Space {
    /// Both spaces.
    pub const ALL: [Space; 2] = [Space::Phase, Space::Dynamical];

    /// Lowercase name used in entry points.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Dynamical => "dynamical",
        }
    }
}

impl RenderMode {
    /// Both modes.
    pub const ALL: [RenderMode; 2] = [RenderMode::Escape, RenderMode::Translated];

    /// Lowercase name used in entry points.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Escape => "escape",
            Self::Translated => "translated",
        }
    }
}

impl Dimensions {
    /// Number of spatial axes.
    pub const fn count(self) -> u32 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.count())
    }
}

/// Unrecognized option text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseOptionError {
    /// Option being parsed
    pub kind: &'static str,
    /// Rejected text
    pub value: String,
}

impl FromStr for Space {
    type Err = ParseOptionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phase" => Ok(Self::Phase),
            "dynamical" => Ok(Self::Dynamical),
            _ => Err(ParseOptionError { kind: "space", value: s.to_string() }),
        }
    }
}

impl FromStr for RenderMode {
    type Err = ParseOptionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "escape" => Ok(Self::Escape),
            "translated" => Ok(Self::Translated),
            _ => Err(ParseOptionError { kind: "render mode", value: s.to_string() }),
        }
    }
}

impl FromStr for Dimensions {
    type Err = ParseOptionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2" | "2d" => Ok(Self::Two),
            "3" | "3d" => Ok(Self::Three),
            _ => Err(ParseOptionError { kind: "dimensionality", value: s.to_string() }),
        }
    }
}

/// One compiled entry point: `(space, mode, system)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelVariant {
    /// Coordinate interpretation
    pub space: Space,
    /// Coloring mode
    pub mode: RenderMode,
    /// Arithmetic
    pub system: NumberSystem,
}

impl KernelVariant {
    /// Variant for the given triple.
    pub const fn new(space: Space, mode: RenderMode, system: NumberSystem) -> Self {
        Self { space, mode, system }
    }

    /// Entry point name, `{space}_{mode}_{system}`.
    pub fn entry_point(&self) -> String {
        format!("{}_{}_{}", self.space.name(), self.mode.name(), self.system.name())
    }

    /// Every variant of one system.
    pub fn for_system(system: NumberSystem) -> impl Iterator<Item = KernelVariant> {
        Space::ALL.into_iter().flat_map(move |space| {
            RenderMode::ALL.into_iter().map(move |mode| KernelVariant::new(space, mode, system))
        })
    }
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry_point())
    }
}
