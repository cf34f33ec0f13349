use serde::{Deserialize, Serialize};
use std::fmt;

/// A broker's address and the unit of priority comparison for election.
///
/// Ordering is derived lexicographically on `(host, port)`, matching the
/// classical bully rule: a strictly greater `PeerId` always wins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId {
    pub host: String,
    pub port: u16,
}

impl PeerId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic_on_host_then_port() {
        let a = PeerId::new("10.0.0.1", 9000);
        let b = PeerId::new("10.0.0.1", 9001);
        let c = PeerId::new("10.0.0.2", 1);
        assert!(a < b);
        assert!(b < c);
    }
}
