use super::{Deferred, Provisioner, Task};
use crate::edit::{edit_file, LineEdit};
use clap::ValueEnum;
use std::fmt;

/// The overclocking presets offered by `raspi-config` for the original Raspberry Pi.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OverclockProfile {
    None,
    Modest,
    Medium,
    High,
    Turbo,
}

/// The `/boot/config.txt` settings for one [OverclockProfile]. Frequencies are in MHz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSettings {
    pub arm_freq: u32,
    pub core_freq: u32,
    pub sdram_freq: u32,
    pub over_voltage: u32,
}

impl OverclockProfile {
    pub fn settings(self) -> ClockSettings {
        let (arm_freq, core_freq, sdram_freq, over_voltage) = match self {
            OverclockProfile::None => (700, 250, 400, 0),
            OverclockProfile::Modest => (800, 250, 400, 0),
            OverclockProfile::Medium => (900, 250, 450, 2),
            OverclockProfile::High => (950, 250, 450, 6),
            OverclockProfile::Turbo => (1000, 500, 600, 6),
        };
        ClockSettings {
            arm_freq,
            core_freq,
            sdram_freq,
            over_voltage,
        }
    }
}

impl fmt::Display for OverclockProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverclockProfile::None => "none",
            OverclockProfile::Modest => "modest",
            OverclockProfile::Medium => "medium",
            OverclockProfile::High => "high",
            OverclockProfile::Turbo => "turbo",
        };
        write!(f, "{name}")
    }
}

/// Applies an [OverclockProfile]. Takes effect at the next boot.
#[derive(Clone, Copy, Debug)]
pub struct SetOverclock {
    pub profile: OverclockProfile,
}

impl Task for SetOverclock {
    fn name(&self) -> &'static str {
        "set-overclock"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let settings = self.profile.settings();
        let edits = [
            ("arm_freq", settings.arm_freq),
            ("core_freq", settings.core_freq),
            ("sdram_freq", settings.sdram_freq),
            ("over_voltage", settings.over_voltage),
        ]
        .into_iter()
        .map(|(key, value)| {
            LineEdit::ensure(&format!(r"^#?\s*{key}\s*="), format!("{key}={value}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

        if edit_file(p.remote(), "/boot/config.txt", &edits)? {
            p.restart().request();
        }
        Ok(())
    }
}
