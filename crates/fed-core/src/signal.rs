//! Traffic-signal data objects.

use crate::ids::SignalGroupId;
use crate::time::SimTime;

/// State of a single signal within a group's state string.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SignalState {
    Red,
    RedYellow,
    Yellow,
    /// Green without priority (must yield).
    Green,
    /// Green with priority.
    GreenPriority,
    OffBlinking,
    #[default]
    Off,
}

impl SignalState {
    /// Decode one character of the simulator's state string.
    ///
    /// Unknown characters decode to [`SignalState::Off`].
    pub fn decode(c: char) -> SignalState {
        match c {
            'r' | 'R' => SignalState::Red,
            'u' => SignalState::RedYellow,
            'y' | 'Y' => SignalState::Yellow,
            'g' => SignalState::Green,
            'G' => SignalState::GreenPriority,
            'o' => SignalState::OffBlinking,
            _ => SignalState::Off,
        }
    }

    /// Decode a whole state string, one signal per character.
    pub fn decode_all(states: &str) -> Vec<SignalState> {
        states.chars().map(SignalState::decode).collect()
    }

    /// Encode back into the simulator's character representation.
    pub fn encode(self) -> char {
        match self {
            SignalState::Red => 'r',
            SignalState::RedYellow => 'u',
            SignalState::Yellow => 'y',
            SignalState::Green => 'g',
            SignalState::GreenPriority => 'G',
            SignalState::OffBlinking => 'o',
            SignalState::Off => 'O',
        }
    }
}

/// Static description of a signal group, published once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalGroupDefinition {
    pub id: SignalGroupId,
    /// Lanes controlled by this group, in signal order.
    pub controlled_lanes: Vec<String>,
}

/// Per-step state of a signal group.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalGroupInfo {
    pub id: SignalGroupId,
    pub program_id: String,
    pub phase_index: u32,
    /// Absolute time of the next phase switch.
    pub next_switch: SimTime,
    pub states: Vec<SignalState>,
}
