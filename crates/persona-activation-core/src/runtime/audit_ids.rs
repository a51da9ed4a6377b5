// persona-activation-core/src/runtime/audit_ids.rs
// ============================================================================
// Module: Audit Identifier Sources
// Description: Random and sequential audit id generators.
// Purpose: Give every resolver run a unique, citeable identifier.
// Dependencies: rand, crate::interfaces
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::AuditId;
use crate::core::hashing::hex_encode;
use crate::interfaces::AuditIdSource;

/// Random id byte count (128 bits).
const RANDOM_ID_BYTES: usize = 16;

/// OS-random audit ids of the form `aud_<32 hex chars>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAuditIdSource;

impl AuditIdSource for RandomAuditIdSource {
    fn next_id(&self) -> AuditId {
        let mut bytes = [0_u8; RANDOM_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        AuditId::new(format!("aud_{}", hex_encode(&bytes)))
    }
}

/// Deterministic ids `<prefix>1`, `<prefix>2`, ... for tests and fixtures.
#[derive(Debug)]
pub struct SequentialAuditIdSource {
    /// Id prefix.
    prefix: String,
    /// Last issued counter value.
    counter: AtomicU64,
}

impl SequentialAuditIdSource {
    /// Creates a source starting at 1.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl AuditIdSource for SequentialAuditIdSource {
    fn next_id(&self) -> AuditId {
        let next = self.counter.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        AuditId::new(format!("{}{next}", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_prefixed_and_distinct() {
        let source = RandomAuditIdSource;
        let first = source.next_id();
        let second = source.next_id();
        assert!(first.as_str().starts_with("aud_"));
        assert_eq!(first.as_str().len(), 4 + RANDOM_ID_BYTES * 2);
        assert_ne!(first, second);
    }

    #[test]
    fn sequential_ids_count_from_one() {
        let source = SequentialAuditIdSource::new("audit-");
        assert_eq!(source.next_id().as_str(), "audit-1");
        assert_eq!(source.next_id().as_str(), "audit-2");
    }
}
