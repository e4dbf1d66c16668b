/// Priority classes for transfer requests.
///
/// The class is the operator-visible concept; the scheduler derives a
/// per-round chunk quota from it. Keeping the two apart means new classes
/// or retuned quotas never leak into the wire format or the request
/// source syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
    Normal,
    High,
    Critical,
}

impl PriorityClass {
    /// Maximum chunks a file may move within one scheduling round.
    ///
    /// A scheduling weight, not a bandwidth guarantee: a file with nothing
    /// left to send consumes none of its quota.
    pub fn chunk_quota(self) -> u32 {
        match self {
            PriorityClass::Critical => 10,
            PriorityClass::High => 4,
            PriorityClass::Normal => 1,
        }
    }

    /// Wire token carried in a request entry.
    pub fn token(self) -> &'static str {
        match self {
            PriorityClass::Critical => "CRITICAL",
            PriorityClass::High => "HIGH",
            PriorityClass::Normal => "NORMAL",
        }
    }

    /// Unrecognized tokens map to `Normal`.
    pub fn parse_token(token: &str) -> Self {
        match token {
            "CRITICAL" => PriorityClass::Critical,
            "HIGH" => PriorityClass::High,
            _ => PriorityClass::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotas() {
        assert_eq!(PriorityClass::Critical.chunk_quota(), 10);
        assert_eq!(PriorityClass::High.chunk_quota(), 4);
        assert_eq!(PriorityClass::Normal.chunk_quota(), 1);
    }

    #[test]
    fn test_ordering() {
        assert!(PriorityClass::Critical > PriorityClass::High);
        assert!(PriorityClass::High > PriorityClass::Normal);
    }

    #[test]
    fn test_token_round_trip() {
        for class in [
            PriorityClass::Critical,
            PriorityClass::High,
            PriorityClass::Normal,
        ] {
            assert_eq!(PriorityClass::parse_token(class.token()), class);
        }
    }

    #[test]
    fn test_unknown_token_is_normal() {
        assert_eq!(PriorityClass::parse_token("URGENT"), PriorityClass::Normal);
        assert_eq!(PriorityClass::parse_token(""), PriorityClass::Normal);
        assert_eq!(PriorityClass::parse_token("critical"), PriorityClass::Normal);
    }
}
