use std::collections::HashSet;
use std::sync::Mutex;

use rand::Rng as _;

use super::{LocalPortRange, Shard, ShardCount};

/// Picks local ports for connections that target a specific shard through
/// the host's shard-aware port, where the shard is derived from
/// `source_port % nr_shards`.
///
/// One instance is shared by all pools of a cluster. The port map is a hint:
/// a port handed out here may still fail to bind, in which case the connect
/// attempt fails as any transient error would.
#[derive(Debug)]
pub struct ShardPortCalculator {
    range: LocalPortRange,
    ports_in_use: Mutex<HashSet<u16>>,
}

impl ShardPortCalculator {
    #[inline]
    pub fn new(range: LocalPortRange) -> Self {
        ShardPortCalculator {
            range,
            ports_in_use: Mutex::new(HashSet::new()),
        }
    }

    /// Picks a port `p` from the range such that
    /// `p % nr_shards == desired_shard` and `p` is not known to be taken,
    /// and marks it used. Thread-safe.
    ///
    /// Returns `None` when every candidate port is taken; the caller then
    /// falls back to a non-shard-aware connect.
    pub fn calc_outgoing_port_num(
        &self,
        nr_shards: ShardCount,
        desired_shard: Shard,
    ) -> Option<u16> {
        assert!(desired_shard < nr_shards.get() as Shard);

        let nr_shards = u32::from(nr_shards.get());
        let range_start = u32::from(self.range.start());
        let range_end = u32::from(self.range.end());

        // Smallest port of the range mapping to the desired shard.
        let first_valid = range_start.div_ceil(nr_shards) * nr_shards + desired_shard;
        if first_valid > range_end {
            return None;
        }

        // Start the walk at a random valid port so that concurrent pools do
        // not pile up on the low end of the range.
        let starting_port = match (range_end + 1).checked_sub(nr_shards) {
            Some(upper) if range_start + nr_shards - 1 < upper => {
                rand::rng().random_range((range_start + nr_shards - 1)..upper) / nr_shards
                    * nr_shards
                    + desired_shard
            }
            _ => first_valid,
        };

        let before_wrap = (starting_port..=range_end).step_by(nr_shards as usize);
        let after_wrap = (first_valid..starting_port).step_by(nr_shards as usize);

        let mut ports_in_use = self.ports_in_use.lock().unwrap();
        for port in before_wrap.chain(after_wrap) {
            let port = port as u16;
            if !ports_in_use.contains(&port) {
                ports_in_use.insert(port);
                return Some(port);
            }
        }
        None
    }

    /// Returns a previously handed out port to the pool of candidates.
    ///
    /// Called when the connection bound to the port closes, and when a
    /// shard-aware connect attempt does not produce a pooled connection.
    pub fn release_port(&self, port: u16) {
        self.ports_in_use.lock().unwrap().remove(&port);
    }
}
