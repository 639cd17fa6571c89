//! Producible resource kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of resources a machine can produce and buffer.
///
/// The snake_case string form is the persisted/display name; unknown names
/// in old data files parse to `None` and are skipped by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Output of miners.
    Cobblestone,
    /// Output of wood cutters.
    OakLog,
    /// Output of crop farms.
    Wheat,
    /// Output of mob grinders.
    RottenFlesh,
    /// Output of sell stations.
    Emerald,
    /// Fallback product for kinds without a dedicated output.
    Stone,
}

impl Resource {
    /// Stable snake_case name used in persisted storage maps.
    pub fn name(self) -> &'static str {
        match self {
            Resource::Cobblestone => "cobblestone",
            Resource::OakLog => "oak_log",
            Resource::Wheat => "wheat",
            Resource::RottenFlesh => "rotten_flesh",
            Resource::Emerald => "emerald",
            Resource::Stone => "stone",
        }
    }

    /// Parse a resource from its persisted name. Returns `None` for names
    /// this build does not know (e.g. data written by a newer version).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cobblestone" => Some(Resource::Cobblestone),
            "oak_log" => Some(Resource::OakLog),
            "wheat" => Some(Resource::Wheat),
            "rotten_flesh" => Some(Resource::RottenFlesh),
            "emerald" => Some(Resource::Emerald),
            "stone" => Some(Resource::Stone),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_parse_are_inverse() {
        for resource in [
            Resource::Cobblestone,
            Resource::OakLog,
            Resource::Wheat,
            Resource::RottenFlesh,
            Resource::Emerald,
            Resource::Stone,
        ] {
            assert_eq!(Resource::parse(resource.name()), Some(resource));
        }
    }

    #[test]
    fn unknown_name_parses_to_none() {
        assert_eq!(Resource::parse("netherite"), None);
        assert_eq!(Resource::parse(""), None);
    }

    #[test]
    fn serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&Resource::OakLog).unwrap();
        assert_eq!(json, "\"oak_log\"");
        let back: Resource = serde_json::from_str("\"rotten_flesh\"").unwrap();
        assert_eq!(back, Resource::RottenFlesh);
    }
}
