use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Counter the minion increments and the master watches.
pub const COUNTER_KEY: &str = "counter";
/// Minion lifecycle, see [`Status`].
pub const STATUS_KEY: &str = "status";
/// Process id the master signals once the threshold is reached.
pub const PID_KEY: &str = "PID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Finished,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Running => "running",
            Status::Finished => "finished",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Status::Running),
            "finished" => Ok(Status::Finished),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [Status::Running, Status::Finished] {
            assert_eq!(status.to_string().parse::<Status>().ok(), Some(status));
        }
        assert!("paused".parse::<Status>().is_err());
    }
}
