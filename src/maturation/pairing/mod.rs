use super::types::Endpoint;
use crate::content::MessageKind;
use std::collections::HashSet;
use std::fmt;

/// Every ordered `(initiator, responder)` index pair over `n` endpoints,
/// without self pairs, in a fresh uniform random order.
pub fn generate_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n.saturating_mul(n.saturating_sub(1)));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                pairs.push((i, j));
            }
        }
    }
    fastrand::shuffle(&mut pairs);
    pairs
}

/// Number of distinct conversation slots per cycle: `n * (n - 1) / 2`.
pub fn slot_count(n: usize) -> usize {
    n.saturating_mul(n.saturating_sub(1)) / 2
}

/// Order-independent key for two identities.
pub fn canonical_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

/// Key for rolling history: the direction and the message kind.
/// `A->B` and `B->A` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    from: String,
    to: String,
    kind: MessageKind,
}

impl PairKey {
    pub fn new(from: &Endpoint, to: &Endpoint, kind: MessageKind) -> Self {
        Self::from_identities(from.identity(), to.identity(), kind)
    }

    pub fn from_identities(from: &str, to: &str, kind: MessageKind) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.kind, self.from, self.to)
    }
}

/// Tracks which conversation slots were already used in the current cycle.
#[derive(Debug, Default)]
pub struct CycleDedup {
    seen: HashSet<String>,
}

impl CycleDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a pair (in either direction) is offered.
    pub fn first_visit(&mut self, a: &Endpoint, b: &Endpoint) -> bool {
        self.seen.insert(canonical_key(a.identity(), b.identity()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
