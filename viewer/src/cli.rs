//! Command-line options and their translation into engine settings.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use hyperorbit_algebra::{Number, NumberSystem};
use hyperorbit_engine::config::{EngineConfig, IterationFunction, DEFAULT_BUILD_LOG};
use hyperorbit_engine::options::{Dimensions, RenderMode, Space};
use hyperorbit_engine::settings::{Settings, ViewWindowSettings};

/// Compute backend selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Host reference backend
    Cpu,
    /// wgpu on the default adapter
    Gpu,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CliError {
    #[error("{what} has {given} components, {system} has {dim}")]
    TooManyComponents { what: &'static str, given: usize, system: &'static str, dim: usize },
    #[error("view mapping for {system}: {reason}")]
    Mapping { system: &'static str, reason: String },
}

/// Render hypercomplex escape-time and orbit fractals headlessly and export PNGs.
#[derive(Parser, Debug)]
#[command(name = "hyperorbit", version, about)]
pub struct Args {
    /// Compute backend
    #[arg(long, value_enum, default_value_t = Backend::Cpu)]
    pub backend: Backend,

    /// Number system (real, complex, quaternion, octonion, bicomplex, tricomplex)
    #[arg(short, long, default_value = "complex", value_parser = parse_system)]
    pub system: NumberSystem,

    /// Iterated map (quadratic, cubic, conjugate)
    #[arg(long, default_value = "quadratic", value_parser = parse_function)]
    pub function: IterationFunction,

    /// Squared-modulus escape threshold
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Cells per axis
    #[arg(short, long, default_value_t = 64)]
    pub resolution: u32,

    /// Grid dimensionality (2 or 3)
    #[arg(short, long, default_value = "2")]
    pub dims: Dimensions,

    /// Maximum frames to render
    #[arg(short, long, default_value_t = 32)]
    pub frames: u32,

    /// Windows to open as `space/mode`, e.g. `phase/escape`; repeatable. Defaults to all four.
    #[arg(short, long = "window", value_parser = parse_window)]
    pub windows: Vec<(Space, RenderMode)>,

    /// View zoom for every window
    #[arg(long)]
    pub zoom: Option<f32>,

    /// View center for every window, comma separated components
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub center: Option<Vec<f32>>,

    /// Global parameter, comma separated components
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    pub parameter: Option<Vec<f32>>,

    /// Component mapped to each grid axis, 1-based and signed, e.g. `1,2,3`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub mapping: Option<Vec<i32>>,

    /// Iteration cap at zoom 1
    #[arg(long)]
    pub modifier: Option<f32>,

    /// Escape-mode iterations per frame
    #[arg(long)]
    pub ipf: Option<u32>,

    /// Directory PNGs are written to
    #[arg(short, long, default_value = "out")]
    pub out: PathBuf,

    /// Kernel build log
    #[arg(long, default_value = DEFAULT_BUILD_LOG)]
    pub build_log: PathBuf,

    /// Log filter directive; overrides RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,
}

fn parse_system(s: &str) -> Result<NumberSystem, String> {
    NumberSystem::from_name(s).ok_or_else(|| {
        let known: Vec<_> = NumberSystem::ALL.iter().map(|n| n.name()).collect();
        format!("unknown number system `{s}` (expected one of {})", known.join(", "))
    })
}

fn parse_function(s: &str) -> Result<IterationFunction, String> {
    IterationFunction::from_name(s).ok_or_else(|| {
        let known: Vec<_> = IterationFunction::ALL.iter().map(|f| f.name()).collect();
        format!("unknown function `{s}` (expected one of {})", known.join(", "))
    })
}

fn parse_window(s: &str) -> Result<(Space, RenderMode), String> {
    let (space, mode) =
        s.split_once('/').ok_or_else(|| format!("expected `space/mode`, got `{s}`"))?;
    Ok((space.parse().map_err(|e| format!("{e}"))?, mode.parse().map_err(|e| format!("{e}"))?))
}

impl Args {
    /// Program-level configuration.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig { build_log_path: self.build_log.clone(), ..Default::default() };
        config.kernel.function = self.function;
        if let Some(t) = self.threshold {
            config.kernel.escape_threshold = t;
        }
        config
    }

    /// Scene settings with every override applied.
    pub fn settings(&self) -> Result<Settings, CliError> {
        let mut settings = Settings::default();
        if !self.windows.is_empty() {
            settings.windows =
                self.windows.iter().map(|&(space, mode)| ViewWindowSettings::new(space, mode)).collect();
        }
        settings.set_number_system(self.system);
        settings.set_dimensions(self.dims);
        settings.resolution = self.resolution.max(1);

        let dim = self.system.dim();
        let number = |what, components: &[f32]| {
            if components.len() > dim {
                Err(CliError::TooManyComponents {
                    what,
                    given: components.len(),
                    system: self.system.name(),
                    dim,
                })
            } else {
                Ok(Number::from_components(components))
            }
        };
        if let Some(p) = &self.parameter {
            settings.parameter = number("parameter", p)?;
        }
        let center = self.center.as_deref().map(|c| number("center", c)).transpose()?;

        for window in &mut settings.windows {
            if let Some(c) = center {
                window.view.center = c;
            }
            if let Some(z) = self.zoom {
                window.view.zoom = z;
            }
            if let Some(m) = &self.mapping {
                for (axis, &component) in window.view.mapping.iter_mut().zip(m) {
                    *axis = component;
                }
            }
            if let Some(m) = self.modifier {
                window.iteration_modifier = m;
            }
            if let Some(ipf) = self.ipf {
                window.iterations_per_frame = ipf;
            }
            window.view.validate(dim).map_err(|e| CliError::Mapping {
                system: self.system.name(),
                reason: e.to_string(),
            })?;
        }
        Ok(settings)
    }
}
