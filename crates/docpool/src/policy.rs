//! Default session policy shared by a pool.

use crate::config::PoolConfig;
use crate::driver::{ReadMode, Session, WriteSafety};

/// Read mode, batch size and write safety applied to sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Read mode.
    pub mode: ReadMode,
    /// Documents per batch; `0` keeps the driver default.
    pub batch_size: u32,
    /// Whether writes must be acknowledged by every configured member.
    pub full_replication: bool,
}

impl SessionPolicy {
    /// Initial policy taken from a pool configuration.
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            mode: config.default_mode,
            batch_size: config.batch_size,
            full_replication: config.require_full_replication,
        }
    }

    /// Write safety for a deployment of `members` endpoints.
    #[must_use]
    pub fn write_safety(&self, members: usize) -> WriteSafety {
        if self.full_replication {
            WriteSafety::replicated(members)
        } else {
            WriteSafety::acknowledged()
        }
    }

    /// Apply the policy to a session.
    pub(crate) fn apply<S: Session>(&self, session: &mut S, members: usize) {
        session.set_mode(self.mode, true);
        if self.batch_size > 0 {
            session.set_batch(self.batch_size);
        }
        session.set_safety(self.write_safety(members));
    }
}
