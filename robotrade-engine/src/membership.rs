//! Worker Membership
//!
//! Partitions a fresh robot list for one symbol against the robots a worker
//! already trades.

use std::collections::{BTreeSet, HashSet};

use robotrade_domain::{Robot, RobotId};

/// Result of comparing a worker's current robots with a fresh list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipDelta {
    /// Robots not attached yet
    pub added: Vec<Robot>,
    /// Attached robots missing from the fresh list
    pub removed: Vec<RobotId>,
    /// Attached robots still present, with their fresh snapshot
    pub retained: Vec<Robot>,
}

impl MembershipDelta {
    /// Ids of added robots
    pub fn added_ids(&self) -> Vec<RobotId> {
        self.added.iter().map(|r| r.robot_id).collect()
    }

    /// Ids of retained robots
    pub fn retained_ids(&self) -> Vec<RobotId> {
        self.retained.iter().map(|r| r.robot_id).collect()
    }

    /// Check if nothing is attached or detached
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Partition `robots` against the ids currently attached.
///
/// Duplicate ids in `robots` keep their first occurrence. `removed` is sorted.
pub fn partition(current: &HashSet<RobotId>, robots: Vec<Robot>) -> MembershipDelta {
    let mut delta = MembershipDelta::default();
    let mut present = HashSet::with_capacity(robots.len());

    for robot in robots {
        if !present.insert(robot.robot_id) {
            continue;
        }
        if current.contains(&robot.robot_id) {
            delta.retained.push(robot);
        } else {
            delta.added.push(robot);
        }
    }

    let removed: BTreeSet<RobotId> = current.difference(&present).copied().collect();
    delta.removed = removed.into_iter().collect();

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robots(ids: &[i64]) -> Vec<Robot> {
        ids.iter().map(|id| Robot::new(*id, 1)).collect()
    }

    #[test]
    fn test_partition() {
        let current = HashSet::from([1, 2, 3]);

        let delta = partition(&current, robots(&[2, 3, 4]));

        assert_eq!(delta.added_ids(), vec![4]);
        assert_eq!(delta.removed, vec![1]);
        assert_eq!(delta.retained_ids(), vec![2, 3]);
        assert!(!delta.is_unchanged());
    }

    #[test]
    fn test_partition_from_empty() {
        let delta = partition(&HashSet::new(), robots(&[5, 6]));

        assert_eq!(delta.added_ids(), vec![5, 6]);
        assert!(delta.removed.is_empty());
        assert!(delta.retained.is_empty());
    }

    #[test]
    fn test_partition_to_empty() {
        let delta = partition(&HashSet::from([3, 1]), Vec::new());

        assert_eq!(delta.removed, vec![1, 3]);
    }

    #[test]
    fn test_partition_same_set_is_unchanged() {
        let delta = partition(&HashSet::from([1, 2]), robots(&[1, 2, 2]));

        assert!(delta.is_unchanged());
        assert_eq!(delta.retained_ids(), vec![1, 2]);
    }
}
