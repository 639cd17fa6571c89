//! Machine kinds and immutable machine definitions.
//!
//! A `MachineKind` is a closed set; everything kind-specific lives in the
//! [`KIND_PROFILES`] table. Adding a kind means adding one table row, not
//! touching scheduler logic.

use serde::Deserialize;
use skyforge_core::Resource;

/// The kinds of machines the game knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    /// Produces cobblestone.
    BasicMiner = 0,
    /// Produces oak logs.
    WoodCutter = 1,
    /// Produces wheat.
    CropFarm = 2,
    /// Produces rotten flesh.
    MobGrinder = 3,
    /// Produces emeralds.
    SellStation = 4,
}

/// Effect family a display collaborator may attach to production events.
/// Playback itself happens outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectProfile {
    /// Stone dust and pickaxe sounds.
    Mining,
    /// Wood chips and axe sounds.
    Logging,
    /// Growth particles and crop sounds.
    Harvest,
    /// Combat particles and mob sounds.
    Grinding,
    /// Sparkles and coin sounds.
    Trade,
}

/// Per-kind lookup row: what the kind produces and how collaborators
/// should present it.
#[derive(Debug)]
pub struct KindProfile {
    /// The kind this row describes.
    pub kind: MachineKind,
    /// The resource a machine of this kind accrues.
    pub primary_product: Resource,
    /// Short glyph a display layer can prefix labels with.
    pub glyph: &'static str,
    /// Effect family for production feedback.
    pub effect: EffectProfile,
}

/// One row per kind, indexed by the kind's discriminant.
pub const KIND_PROFILES: &[KindProfile] = &[
    KindProfile {
        kind: MachineKind::BasicMiner,
        primary_product: Resource::Cobblestone,
        glyph: "⛏",
        effect: EffectProfile::Mining,
    },
    KindProfile {
        kind: MachineKind::WoodCutter,
        primary_product: Resource::OakLog,
        glyph: "🪓",
        effect: EffectProfile::Logging,
    },
    KindProfile {
        kind: MachineKind::CropFarm,
        primary_product: Resource::Wheat,
        glyph: "🌾",
        effect: EffectProfile::Harvest,
    },
    KindProfile {
        kind: MachineKind::MobGrinder,
        primary_product: Resource::RottenFlesh,
        glyph: "⚔",
        effect: EffectProfile::Grinding,
    },
    KindProfile {
        kind: MachineKind::SellStation,
        primary_product: Resource::Emerald,
        glyph: "💰",
        effect: EffectProfile::Trade,
    },
];

impl MachineKind {
    /// Parse a kind from a config string. Accepts the canonical snake_case
    /// name plus the shorthand aliases found in older config files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "basic_miner" | "basicminer" | "miner" => Some(MachineKind::BasicMiner),
            "wood_cutter" | "woodcutter" | "lumber" => Some(MachineKind::WoodCutter),
            "crop_farm" | "cropfarm" | "farm" => Some(MachineKind::CropFarm),
            "mob_grinder" | "mobgrinder" | "grinder" => Some(MachineKind::MobGrinder),
            "sell_station" | "sellstation" | "shop" => Some(MachineKind::SellStation),
            _ => None,
        }
    }

    /// Canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            MachineKind::BasicMiner => "basic_miner",
            MachineKind::WoodCutter => "wood_cutter",
            MachineKind::CropFarm => "crop_farm",
            MachineKind::MobGrinder => "mob_grinder",
            MachineKind::SellStation => "sell_station",
        }
    }

    /// The profile row for this kind.
    pub fn profile(self) -> &'static KindProfile {
        &KIND_PROFILES[self as usize]
    }

    /// The resource machines of this kind accrue.
    pub fn primary_product(self) -> Resource {
        self.profile().primary_product
    }
}

/// Immutable template for a machine kind, loaded once from configuration.
/// Many active machines share one definition.
#[derive(Debug, Clone)]
pub struct MachineDefinition {
    /// Kind tag, drives the profile lookup.
    pub kind: MachineKind,
    /// Stable config id (e.g. `basic_miner`).
    pub id: String,
    /// Human-readable name for displays.
    pub display_name: String,
    /// Block the world collaborator places as the machine's marker.
    pub marker_block: String,
    /// Production interval at level 1, in scheduler ticks.
    pub base_interval_ticks: u64,
    /// Units produced per cycle at level 1.
    pub base_yield: u32,
}

impl MachineDefinition {
    /// The resource this definition's machines accrue.
    pub fn primary_product(&self) -> Resource {
        self.kind.primary_product()
    }
}

/// Raw JSON shape of one definition entry. Absent fields fall back to the
/// historical defaults (interval 40, yield 1, stone marker).
#[derive(Debug, Deserialize)]
pub struct RawDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_marker_block")]
    pub block: String,
    #[serde(default = "default_interval")]
    pub base_interval: u64,
    #[serde(default = "default_yield")]
    pub base_yield: u32,
}

fn default_marker_block() -> String {
    "stone".to_string()
}

fn default_interval() -> u64 {
    40
}

fn default_yield() -> u32 {
    1
}
