// Prospect, position, and pick record types shared by the draft order builder,
// the MaxPF calculator, and the mock draft generator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Football positions as reported by Sleeper and the prospect pool feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,
    #[serde(rename = "RB")]
    RunningBack,
    #[serde(rename = "WR")]
    WideReceiver,
    #[serde(rename = "TE")]
    TightEnd,
    #[serde(rename = "K")]
    Kicker,
    #[serde(rename = "DEF")]
    Defense,
    #[serde(rename = "DL")]
    DefensiveLine,
    #[serde(rename = "LB")]
    Linebacker,
    #[serde(rename = "DB")]
    DefensiveBack,
    #[serde(rename = "UNK")]
    Unknown,
}

impl Position {
    /// Parse a position code into a Position.
    ///
    /// Handles common feed abbreviations:
    /// - "DST" / "D/ST" -> Defense, "PK" -> Kicker
    /// - "DE" / "DT" -> DefensiveLine, "CB" / "S" -> DefensiveBack
    /// - "OLB" / "ILB" / "MLB" -> Linebacker
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" | "HB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" | "PK" => Some(Position::Kicker),
            "DEF" | "DST" | "D/ST" => Some(Position::Defense),
            "DL" | "DE" | "DT" => Some(Position::DefensiveLine),
            "LB" | "OLB" | "ILB" | "MLB" => Some(Position::Linebacker),
            "DB" | "CB" | "S" | "FS" | "SS" => Some(Position::DefensiveBack),
            _ => None,
        }
    }

    /// Like [`Position::from_str_pos`] but maps unrecognized codes to `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str_pos(s).unwrap_or(Position::Unknown)
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
            Position::DefensiveLine => "DL",
            Position::Linebacker => "LB",
            Position::DefensiveBack => "DB",
            Position::Unknown => "UNK",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A ranked rookie prospect in the draft pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: String,
    pub name: String,
    pub position: Position,
    /// Uppercased code as the feed spelled it ("FB", "EDGE", "HB").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_code: Option<String>,
    /// Overall rank, 1 = best. Unique within a pool.
    pub rank: u32,
    pub value: f64,
}

impl Prospect {
    /// Position shown in prompts and articles: the feed's own code when it
    /// had one, else the canonical abbreviation.
    pub fn position_label(&self) -> &str {
        self.position_code
            .as_deref()
            .unwrap_or_else(|| self.position.display_str())
    }

    /// Last whitespace-separated token of the name ("Jr."-style suffixes are
    /// not special-cased).
    pub fn surname(&self) -> &str {
        surname_of(&self.name)
    }
}

pub(crate) fn surname_of(name: &str) -> &str {
    name.split_whitespace().last().unwrap_or(name)
}

/// One simulated selection in a mock draft. Append-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRecord {
    /// "round.slot" with a two-digit slot, e.g. "1.01".
    pub pick_number: String,
    pub team_name: String,
    pub player: Prospect,
    pub reason: String,
}

/// Format a pick number as `"{round}.{slot:02}"`.
pub fn format_pick_number(round: u32, slot: u32) -> String {
    format!("{round}.{slot:02}")
}

/// Extract the round from a `"round.slot"` pick number.
pub fn round_of_pick_number(pick_number: &str) -> Option<u32> {
    pick_number.split('.').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_pos_standard_positions() {
        assert_eq!(Position::from_str_pos("QB"), Some(Position::Quarterback));
        assert_eq!(Position::from_str_pos("RB"), Some(Position::RunningBack));
        assert_eq!(Position::from_str_pos("WR"), Some(Position::WideReceiver));
        assert_eq!(Position::from_str_pos("TE"), Some(Position::TightEnd));
        assert_eq!(Position::from_str_pos("K"), Some(Position::Kicker));
        assert_eq!(Position::from_str_pos("DEF"), Some(Position::Defense));
    }

    #[test]
    fn from_str_pos_aliases_and_case() {
        assert_eq!(Position::from_str_pos("wr"), Some(Position::WideReceiver));
        assert_eq!(Position::from_str_pos(" te "), Some(Position::TightEnd));
        assert_eq!(Position::from_str_pos("D/ST"), Some(Position::Defense));
        assert_eq!(Position::from_str_pos("CB"), Some(Position::DefensiveBack));
        assert_eq!(Position::from_str_pos("ILB"), Some(Position::Linebacker));
    }

    #[test]
    fn from_str_pos_invalid() {
        assert_eq!(Position::from_str_pos(""), None);
        assert_eq!(Position::from_str_pos("XX"), None);
        assert_eq!(Position::parse_lenient("XX"), Position::Unknown);
    }

    #[test]
    fn display_str_roundtrip() {
        let positions = [
            Position::Quarterback,
            Position::RunningBack,
            Position::WideReceiver,
            Position::TightEnd,
            Position::Kicker,
            Position::Defense,
            Position::DefensiveLine,
            Position::Linebacker,
            Position::DefensiveBack,
        ];
        for pos in positions {
            assert_eq!(Position::from_str_pos(pos.display_str()), Some(pos));
        }
    }

    #[test]
    fn position_serializes_as_code() {
        let json = serde_json::to_string(&Position::WideReceiver).unwrap();
        assert_eq!(json, "\"WR\"");
        let back: Position = serde_json::from_str("\"UNK\"").unwrap();
        assert_eq!(back, Position::Unknown);
    }

    #[test]
    fn pick_number_formatting() {
        assert_eq!(format_pick_number(1, 1), "1.01");
        assert_eq!(format_pick_number(2, 12), "2.12");
        assert_eq!(round_of_pick_number("3.07"), Some(3));
        assert_eq!(round_of_pick_number("garbage"), None);
    }

    #[test]
    fn surname_is_last_token() {
        let p = Prospect {
            id: "1".into(),
            name: "Marvin Harrison Jr.".into(),
            position: Position::WideReceiver,
            position_code: None,
            rank: 1,
            value: 9000.0,
        };
        assert_eq!(p.surname(), "Jr.");
        assert_eq!(surname_of("Cher"), "Cher");
        assert_eq!(p.position_label(), "WR");

        let fullback = Prospect {
            position: Position::Unknown,
            position_code: Some("FB".into()),
            ..p
        };
        assert_eq!(fullback.position_label(), "FB");
    }
}
