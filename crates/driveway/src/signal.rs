//! Signals and their capabilities

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DrivewayError;

/// Displayable aspect of a main signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum MainAspect {
    Hp0,
    Hp0PlusSh1,
    Hp0WithDrivingIndicator,
    Ks1,
    Ks1Flashing,
    Ks1FlashingWithAdditionalLight,
    Ks2,
    Ks2WithAdditionalLight,
    Sh1,
    IdLight,
    Hp0Hv,
    Hp1,
    Hp2,
    Vr0,
    Vr1,
    Vr2,
    Off,
}

impl MainAspect {
    pub const ALL: [MainAspect; 17] = [
        MainAspect::Hp0,
        MainAspect::Hp0PlusSh1,
        MainAspect::Hp0WithDrivingIndicator,
        MainAspect::Ks1,
        MainAspect::Ks1Flashing,
        MainAspect::Ks1FlashingWithAdditionalLight,
        MainAspect::Ks2,
        MainAspect::Ks2WithAdditionalLight,
        MainAspect::Sh1,
        MainAspect::IdLight,
        MainAspect::Hp0Hv,
        MainAspect::Hp1,
        MainAspect::Hp2,
        MainAspect::Vr0,
        MainAspect::Vr1,
        MainAspect::Vr2,
        MainAspect::Off,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            MainAspect::Hp0 => "Hp0",
            MainAspect::Hp0PlusSh1 => "Hp0PlusSh1",
            MainAspect::Hp0WithDrivingIndicator => "Hp0WithDrivingIndicator",
            MainAspect::Ks1 => "Ks1",
            MainAspect::Ks1Flashing => "Ks1Flashing",
            MainAspect::Ks1FlashingWithAdditionalLight => "Ks1FlashingWithAdditionalLight",
            MainAspect::Ks2 => "Ks2",
            MainAspect::Ks2WithAdditionalLight => "Ks2WithAdditionalLight",
            MainAspect::Sh1 => "Sh1",
            MainAspect::IdLight => "IdLight",
            MainAspect::Hp0Hv => "Hp0Hv",
            MainAspect::Hp1 => "Hp1",
            MainAspect::Hp2 => "Hp2",
            MainAspect::Vr0 => "Vr0",
            MainAspect::Vr1 => "Vr1",
            MainAspect::Vr2 => "Vr2",
            MainAspect::Off => "Off",
        }
    }
}

impl fmt::Display for MainAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for MainAspect {
    type Err = DrivewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MainAspect::ALL
            .into_iter()
            .find(|aspect| aspect.symbol().eq_ignore_ascii_case(s))
            .ok_or_else(|| DrivewayError::Import(format!("Unknown main signal state `{s}`")))
    }
}

impl TryFrom<String> for MainAspect {
    type Error = DrivewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Speed class shown by a Zs3/Zs3v indicator (value × 10 km/h), `0..=16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Zs3Symbol(u8);

impl Zs3Symbol {
    pub const MAX: u8 = 16;

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Speed class for a speed limit in km/h, rounding down
    pub fn for_speed(maximum_speed: u32) -> Option<Self> {
        u8::try_from(maximum_speed / 10)
            .ok()
            .and_then(|class| Self::try_from(class).ok())
    }
}

impl TryFrom<u8> for Zs3Symbol {
    type Error = DrivewayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Zs3Symbol(value))
        } else {
            Err(DrivewayError::Import(format!(
                "Zs3 symbol {value} is outside 0..={}",
                Self::MAX
            )))
        }
    }
}

impl From<Zs3Symbol> for u8 {
    fn from(symbol: Zs3Symbol) -> Self {
        symbol.0
    }
}

/// Supplementary signal unit mounted on a main signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdditionalSignal {
    Zs3 { id: Uuid, symbols: Vec<Zs3Symbol> },
    Zs3v { id: Uuid, symbols: Vec<Zs3Symbol> },
    Zs2 { id: Uuid, symbols: Vec<String> },
    Zs2v { id: Uuid, symbols: Vec<String> },
    Other { id: Uuid, symbols: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Main,
    Additional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub name: Option<String>,
    pub kind: SignalKind,
    #[serde(default)]
    pub supported_states: Vec<MainAspect>,
    #[serde(default)]
    pub additional_signals: Vec<AdditionalSignal>,
    /// Node the signal faces away from; trains pass it coming from here
    pub previous_node: Uuid,
    pub next_node: Uuid,
}

impl Signal {
    pub fn new(id: Uuid, kind: SignalKind, previous_node: Uuid, next_node: Uuid) -> Self {
        Self {
            id,
            name: None,
            kind,
            supported_states: Vec::new(),
            additional_signals: Vec::new(),
            previous_node,
            next_node,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_supported_states(mut self, states: Vec<MainAspect>) -> Self {
        self.supported_states = states;
        self
    }

    pub fn with_additional_signal(mut self, additional: AdditionalSignal) -> Self {
        self.additional_signals.push(additional);
        self
    }

    pub fn is_main(&self) -> bool {
        self.kind == SignalKind::Main
    }

    pub fn supports(&self, aspect: MainAspect) -> bool {
        self.supported_states.contains(&aspect)
    }
}
