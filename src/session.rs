//! Serialized session model for the CLI and for scripted setups.
//!
//! A session names its inputs, wires the initial bus assignments and picks an
//! armed transition; `build` turns it into a running [`Studio`].

use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    core::MixConfig,
    error::{MixError, MixResult},
    generators::{
        CheckerboardSource, ColorSource, EbuBarsSource, GradientShape, GradientSource,
        NoiseSource, SmpteBarsSource,
    },
    mixbus::TransitionKind,
    players::{SequenceSource, StillSource},
    source::SourceId,
    stinger::StingerSequence,
    studio::{BusSlot, ControlCommand, Studio},
};

fn default_checker_square() -> u32 {
    64
}

/// One named input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: InputKind,
}

/// What kind of source an input is, tagged by `type` in the JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    Color {
        rgb: [u8; 3],
    },
    EbuBars,
    SmpteBars,
    Gradient {
        shape: GradientShape,
        start: [u8; 3],
        end: [u8; 3],
    },
    Checkerboard {
        #[serde(default = "default_checker_square")]
        square: u32,
    },
    Noise {
        #[serde(default)]
        seed: u64,
    },
    Still {
        path: PathBuf,
    },
    Sequence {
        dir: PathBuf,
        #[serde(default)]
        looped: bool,
    },
}

/// Stinger animation reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StingerSpec {
    pub dir: PathBuf,
    #[serde(default)]
    pub switch_index: Option<usize>,
    #[serde(default)]
    pub looped: bool,
}

/// A complete session file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionSpec {
    #[serde(default)]
    pub config: MixConfig,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub still: Option<PathBuf>,
    #[serde(default)]
    pub stinger: Option<StingerSpec>,
    #[serde(default)]
    pub transition: Option<TransitionKind>,
}

impl SessionSpec {
    pub fn from_json(json: &str) -> MixResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MixError::validation(format!("session parse: {e}")))
    }

    pub fn to_json(&self) -> MixResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MixError::validation(format!("session encode: {e}")))
    }

    /// Build a wired studio: register every input, load still/stinger assets,
    /// apply assignments and arm the transition.
    #[tracing::instrument(skip(self), fields(inputs = self.inputs.len()))]
    pub fn build(&self) -> MixResult<Studio> {
        let mut studio = Studio::new(self.config)?;
        let mut by_name: HashMap<&str, SourceId> = HashMap::new();

        for input in &self.inputs {
            if by_name.contains_key(input.name.as_str()) {
                return Err(MixError::validation(format!(
                    "duplicate input name {:?}",
                    input.name
                )));
            }
            let id = register_input(&mut studio, &input.kind)?;
            by_name.insert(input.name.as_str(), id);
        }

        if let Some(path) = &self.still {
            let frame = crate::assets::load_frame(path, self.config.width, self.config.height)?;
            studio.set_still(frame)?;
        }
        if let Some(spec) = &self.stinger {
            let stinger = StingerSequence::from_dir(
                &spec.dir,
                self.config.width,
                self.config.height,
                spec.switch_index,
                spec.looped,
            )?;
            studio.set_stinger(stinger)?;
        }

        for (slot, name) in [
            (BusSlot::Program, &self.program),
            (BusSlot::Preview, &self.preview),
        ] {
            if let Some(name) = name {
                let id = *by_name.get(name.as_str()).ok_or_else(|| {
                    MixError::validation(format!("unknown input name {name:?}"))
                })?;
                studio.apply(ControlCommand::Assign { slot, source: id })?;
            }
        }

        if let Some(kind) = self.transition {
            studio.apply(ControlCommand::SetTransition(kind))?;
        }

        tracing::debug!(sources = by_name.len(), "session built");
        Ok(studio)
    }
}

fn register_input(studio: &mut Studio, kind: &InputKind) -> MixResult<SourceId> {
    let config = *studio.config();
    let id = match kind {
        InputKind::Color { rgb } => studio.add_source(ColorSource::new(&config, *rgb)),
        InputKind::EbuBars => studio.add_source(EbuBarsSource::new(&config)),
        InputKind::SmpteBars => studio.add_source(SmpteBarsSource::new(&config)),
        InputKind::Gradient { shape, start, end } => {
            studio.add_source(GradientSource::new(&config, *shape, *start, *end))
        }
        InputKind::Checkerboard { square } => {
            studio.add_source(CheckerboardSource::new(&config, *square))
        }
        InputKind::Noise { seed } => studio.add_source(NoiseSource::new(&config, *seed)),
        InputKind::Still { path } => {
            let source = StillSource::from_path(&config, path)?;
            studio.add_source(source)
        }
        InputKind::Sequence { dir, looped } => {
            let source = SequenceSource::from_dir(&config, dir, *looped)?;
            studio.add_source(source)
        }
    };
    Ok(id)
}
