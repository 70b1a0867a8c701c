use std::fmt;

use serde::{Deserialize, Serialize};

/// Urgency of a to-do or schedule item. Serialised as the backend's
/// three-letter codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "reg")]
    Regular,
    #[serde(rename = "sig")]
    Significant,
    #[serde(rename = "urg")]
    Urgent,
    #[serde(rename = "sev")]
    Severe,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Low,
        Priority::Regular,
        Priority::Significant,
        Priority::Urgent,
        Priority::Severe,
    ];

    /// The wire code, e.g. `reg`.
    pub fn code(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Regular => "reg",
            Priority::Significant => "sig",
            Priority::Urgent => "urg",
            Priority::Severe => "sev",
        }
    }

    /// The display title, e.g. `Regular`.
    pub fn title(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Regular => "Regular",
            Priority::Significant => "Significant",
            Priority::Urgent => "Urgent",
            Priority::Severe => "Severe",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
