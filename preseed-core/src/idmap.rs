//! uid/gid allocation detection
//!
//! Reads the subordinate id ranges delegated to the daemon's user
//! (`/etc/subuid`, `/etc/subgid`) and checks them against the ranges the
//! current process can actually map (`/proc/self/uid_map`, `/proc/self/gid_map`).

/// A contiguous id range `[start, start + count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub start: u64,
    pub count: u64,
}

impl IdRange {
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.count)
    }

    /// Whether `other` lies entirely inside this range
    pub fn covers(&self, other: &IdRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

/// Delegated uid and gid ranges plus whether the kernel map can honour them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdmapCapacity {
    pub uid_ranges: Vec<IdRange>,
    pub gid_ranges: Vec<IdRange>,
    pub usable: bool,
}

impl IdmapCapacity {
    /// Enough ids to give containers their own allocation
    pub fn is_sufficient(&self) -> bool {
        !self.uid_ranges.is_empty() && !self.gid_ranges.is_empty() && self.usable
    }
}

/// Parse `/etc/subuid`-style content (`user:start:count`) for one user
pub fn parse_subid(content: &str, user: &str) -> Vec<IdRange> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let owner = fields.next()?;
            let start = fields.next()?.parse().ok()?;
            let count = fields.next()?.parse().ok()?;
            (owner == user && count > 0).then_some(IdRange { start, count })
        })
        .collect()
}

/// Parse `/proc/self/uid_map` content into the ranges usable from inside
/// this namespace (first column plus count)
pub fn parse_kernel_map(content: &str) -> Vec<IdRange> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let inside: u64 = fields.next()?.parse().ok()?;
            let _outside: u64 = fields.next()?.parse().ok()?;
            let count: u64 = fields.next()?.parse().ok()?;
            Some(IdRange {
                start: inside,
                count,
            })
        })
        .collect()
}

/// Every delegated range must fall inside one kernel-mapped range
pub fn ranges_usable(delegated: &[IdRange], kernel: &[IdRange]) -> bool {
    delegated
        .iter()
        .all(|range| kernel.iter().any(|mapped| mapped.covers(range)))
}

/// The identity map is the full 32-bit range when not inside a user namespace
pub fn is_initial_namespace_map(content: &str) -> bool {
    let mut fields = content.split_whitespace();
    matches!(
        (fields.next(), fields.next(), fields.next()),
        (Some("0"), Some("0"), Some("4294967295"))
    )
}
