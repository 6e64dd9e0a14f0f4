//! Precomputed curves for volume transitions.
//!
//! Both tables are built once and never change afterwards. Lookups clamp
//! their input to [0, 1] and index the nearest lower entry without
//! interpolating, which bounds the error by one table step.

use serde::{Deserialize, Serialize};

/// Number of entries in every lookup table.
pub const TABLE_SIZE: usize = 4000;

/// Dynamic range of the logarithmic volume curve, in decades (60 dB).
const VOLUME_DECADES: f64 = 3.0;

/// Maps `x` in [0, 1] to a table index.
#[inline]
fn table_index(x: f64) -> usize {
    // NaN falls through clamp unchanged and saturates to 0 in the cast.
    let x = x.clamp(0.0, 1.0);
    (x * (TABLE_SIZE - 1) as f64) as usize
}

/// Cubic ease-in lookup table (`x^3`).
#[derive(Debug, Clone)]
pub struct EasingTable {
    table: Box<[f64]>,
}

impl EasingTable {
    /// Builds the table.
    pub fn new() -> Self {
        let table = (0..TABLE_SIZE)
            .map(|i| {
                let x = i as f64 / (TABLE_SIZE - 1) as f64;
                x * x * x
            })
            .collect();
        Self { table }
    }

    /// Returns the eased value for `progress`, mapped onto `[from, to]`.
    #[inline]
    pub fn ease(&self, progress: f64, from: f64, to: f64) -> f64 {
        from + self.table[table_index(progress)] * (to - from)
    }
}

impl Default for EasingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Logarithmic loudness lookup table (`10^((1-x) * -3)`).
#[derive(Debug, Clone)]
pub struct VolumeTable {
    table: Box<[f64]>,
}

impl VolumeTable {
    /// Builds the table.
    pub fn new() -> Self {
        let table = (0..TABLE_SIZE)
            .map(|i| {
                let x = i as f64 / (TABLE_SIZE - 1) as f64;
                10f64.powf((1.0 - x) * -VOLUME_DECADES)
            })
            .collect();
        Self { table }
    }

    /// Returns the perceptual gain for a raw volume.
    ///
    /// A volume of zero or below is a hard mute rather than -60 dB.
    #[inline]
    pub fn gain(&self, volume: f64) -> f64 {
        if volume <= 0.0 {
            return 0.0;
        }
        self.table[table_index(volume)]
    }
}

impl Default for VolumeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// How a source's volume becomes the gain applied to its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeCurve {
    /// The volume is the gain.
    #[default]
    Linear,
    /// The volume goes through [`VolumeTable`] first.
    Logarithmic,
}

impl std::str::FromStr for VolumeCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "logarithmic" | "log" => Ok(Self::Logarithmic),
            other => Err(format!("unknown volume curve: {}", other)),
        }
    }
}

/// The lookup tables a [`Mixer`](super::Mixer) needs, built eagerly.
#[derive(Debug, Clone, Default)]
pub struct MixTables {
    pub easing: EasingTable,
    pub volume: VolumeTable,
}

impl MixTables {
    /// Builds all tables.
    pub fn new() -> Self {
        Self {
            easing: EasingTable::new(),
            volume: VolumeTable::new(),
        }
    }

    /// Returns the gain for `volume` under `curve`.
    #[inline]
    pub fn gain(&self, curve: VolumeCurve, volume: f64) -> f64 {
        match curve {
            VolumeCurve::Linear => volume,
            VolumeCurve::Logarithmic => self.volume.gain(volume),
        }
    }
}
