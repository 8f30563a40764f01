use serde::{Deserialize, Serialize};

/// One raw observation from the platform connectivity API or a reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub connected: bool,
    pub reachable: bool,
}

impl ProbeReading {
    pub fn new(connected: bool, reachable: bool) -> Self {
        Self {
            connected,
            reachable,
        }
    }

    pub fn online() -> Self {
        Self::new(true, true)
    }

    pub fn offline() -> Self {
        Self::new(false, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkState {
    pub connected: bool,
    pub reachable: bool,
    pub online: bool,
}

impl NetworkState {
    pub fn from_reading(reading: ProbeReading) -> Self {
        Self {
            connected: reading.connected,
            reachable: reading.reachable,
            online: reading.connected && reading.reachable,
        }
    }

    pub fn offline() -> Self {
        Self::from_reading(ProbeReading::offline())
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::offline()
    }
}
