use core::fmt;

/// One of the two exclusive resources the workers compete for.
///
/// In the printer/scanner story, `R1` is the printer and `R2` the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceId {
    R1,
    R2,
}

impl ResourceId {
    pub const ALL: [ResourceId; 2] = [ResourceId::R1, ResourceId::R2];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::R1 => f.write_str("R1"),
            ResourceId::R2 => f.write_str("R2"),
        }
    }
}

/// One of the two competing workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkerId {
    A,
    B,
}

impl WorkerId {
    pub const ALL: [WorkerId; 2] = [WorkerId::A, WorkerId::B];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// The other worker.
    #[inline]
    pub const fn peer(self) -> WorkerId {
        match self {
            WorkerId::A => WorkerId::B,
            WorkerId::B => WorkerId::A,
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::A => f.write_str("worker A"),
            WorkerId::B => f.write_str("worker B"),
        }
    }
}

/// The order in which a worker takes the two resources.
///
/// Two workers can only deadlock if their orders differ. Giving both the
/// same global order, [`FixedOrder`](Self::FixedOrder), removes the hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionOrder {
    /// `R1`, then `R2`.
    FixedOrder,
    /// `R2`, then `R1`.
    ReverseOrder,
}

impl AcquisitionOrder {
    /// Resources in the order they are acquired.
    #[inline]
    pub const fn sequence(self) -> [ResourceId; 2] {
        match self {
            AcquisitionOrder::FixedOrder => [ResourceId::R1, ResourceId::R2],
            AcquisitionOrder::ReverseOrder => [ResourceId::R2, ResourceId::R1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AcquisitionOrder, ResourceId, WorkerId};

    #[test]
    fn sequences() {
        use ResourceId::*;
        assert_eq!(AcquisitionOrder::FixedOrder.sequence(), [R1, R2]);
        assert_eq!(AcquisitionOrder::ReverseOrder.sequence(), [R2, R1]);
    }

    #[test]
    fn peers() {
        assert_eq!(WorkerId::A.peer(), WorkerId::B);
        assert_eq!(WorkerId::B.peer(), WorkerId::A);
        assert_eq!(WorkerId::B.index(), 1);
    }
}
