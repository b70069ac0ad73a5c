use serde::{Deserialize, Serialize};
use std::fmt;

/// Telemetry categories pulled out of a dataflash log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageType {
    /// RCOU: servo/motor outputs C1..C4
    MotorOutput,
    /// VIBE: VibeX/Y/Z plus cumulative Clip0/1/2
    Vibration,
    /// POWR: board rail, Vcc
    PowerRail,
    /// CAM: camera feedback, one row per photo
    CameraFeedback,
    /// TRIG: one row per trigger pulse
    Trigger,
    /// EV: event markers, bounds the flight window
    EventMarker,
    /// MSG: free-text status messages
    StatusText,
    /// TERR: terrain height
    TerrainHeight,
    /// BAT: battery state, CurrTot in mAh
    Battery,
}

impl MessageType {
    pub const ALL: [MessageType; 9] = [
        MessageType::CameraFeedback,
        MessageType::EventMarker,
        MessageType::Battery,
        MessageType::StatusText,
        MessageType::PowerRail,
        MessageType::MotorOutput,
        MessageType::TerrainHeight,
        MessageType::Trigger,
        MessageType::Vibration,
    ];

    /// Dataflash message name, as passed to the decoder's `--types`.
    pub fn code(&self) -> &'static str {
        match self {
            MessageType::MotorOutput => "RCOU",
            MessageType::Vibration => "VIBE",
            MessageType::PowerRail => "POWR",
            MessageType::CameraFeedback => "CAM",
            MessageType::Trigger => "TRIG",
            MessageType::EventMarker => "EV",
            MessageType::StatusText => "MSG",
            MessageType::TerrainHeight => "TERR",
            MessageType::Battery => "BAT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code().eq_ignore_ascii_case(code))
    }

    /// A flight cannot be reported without these: EV gives the flight
    /// timestamp and MSG the aircraft identity.
    pub fn is_hard_required(&self) -> bool {
        matches!(self, MessageType::EventMarker | MessageType::StatusText)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
