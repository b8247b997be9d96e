use serde::{Deserialize, Serialize};

/// One cell of the betting grid. `id` is the slot's position along the
/// track path and the number viewers bet on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSlot {
    pub id: u32,
    pub r: u32,
    pub c: u32,
}

/// Path layout used to number the grid cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackShape {
    #[default]
    Perimeter,
    Snake,
    Spiral,
    Custom,
}

impl TrackShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackShape::Perimeter => "perimeter",
            TrackShape::Snake => "snake",
            TrackShape::Spiral => "spiral",
            TrackShape::Custom => "custom",
        }
    }

    /// Case-insensitive parse; unknown names return `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "perimeter" => Some(TrackShape::Perimeter),
            "snake" => Some(TrackShape::Snake),
            "spiral" => Some(TrackShape::Spiral),
            "custom" => Some(TrackShape::Custom),
            _ => None,
        }
    }
}

/// The two jackpot positions on the track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotSlots {
    pub big: u32,
    pub small: u32,
}

impl JackpotSlots {
    pub fn contains(&self, slot: u32) -> bool {
        slot == self.big || slot == self.small
    }
}
