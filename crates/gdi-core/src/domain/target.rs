use serde::{Deserialize, Serialize};
use std::fmt;

/// Object collection a task addresses.
///
/// The set of targets belongs to the surrounding system; this layer only
/// carries the value around. A few well-known kinds are named here because
/// dispatch treats job submission specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(u32);

impl Target {
    pub const ADMIN_HOST_LIST: Self = Self(1);
    pub const SUBMIT_HOST_LIST: Self = Self(2);
    pub const EXEC_HOST_LIST: Self = Self(3);
    pub const CLUSTER_QUEUE_LIST: Self = Self(4);
    pub const JOB_LIST: Self = Self(5);
    pub const USERSET_LIST: Self = Self(10);
    pub const CONFIG_LIST: Self = Self(14);
    pub const HOST_GROUP_LIST: Self = Self(21);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_job_submission(self) -> bool {
        self == Self::JOB_LIST
    }

    fn well_known_name(self) -> Option<&'static str> {
        Some(match self {
            Self::ADMIN_HOST_LIST => "ADMIN_HOST_LIST",
            Self::SUBMIT_HOST_LIST => "SUBMIT_HOST_LIST",
            Self::EXEC_HOST_LIST => "EXEC_HOST_LIST",
            Self::CLUSTER_QUEUE_LIST => "CLUSTER_QUEUE_LIST",
            Self::JOB_LIST => "JOB_LIST",
            Self::USERSET_LIST => "USERSET_LIST",
            Self::CONFIG_LIST => "CONFIG_LIST",
            Self::HOST_GROUP_LIST => "HOST_GROUP_LIST",
            _ => return None,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.well_known_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "TARGET({})", self.0),
        }
    }
}
