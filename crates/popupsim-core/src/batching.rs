// SPDX-License-Identifier: Apache-2.0
//! Batch formation rules, one per transport hop (§4.7).
//!
//! Each rule only decides *which wagons*, in FIFO order, form the next
//! batch; rake validity is checked separately by [`crate::coupling`] once a
//! candidate batch is picked.

use crate::ids::WagonId;
use crate::model::Wagon;

/// Packs from the front of `queue` (a track's FIFO, oldest first) until
/// adding the next wagon would exceed `free_capacity` metres. Takes the
/// partial batch as-is; never returns an empty batch unless even the first
/// wagon doesn't fit.
///
/// Used for the collection-to-retrofit hop. The data model has no notion of
/// a locomotive haul-capacity limit distinct from the destination track's
/// free capacity, so the destination track is the only constraint (see
/// `DESIGN.md`).
#[must_use]
pub fn pack_by_capacity(queue: &[WagonId], wagons: &dyn Fn(&WagonId) -> f64, free_capacity: f64) -> Vec<WagonId> {
    let mut taken = Vec::new();
    let mut used = 0.0_f64;
    for id in queue {
        let len = wagons(id);
        if used + len > free_capacity {
            break;
        }
        used += len;
        taken.push(id.clone());
    }
    taken
}

/// Retrofit-to-workshop batch size: the smaller of the workshop's free
/// bays and the number of wagons waiting on the retrofit track.
#[must_use]
pub fn pack_by_bay_count(queue: &[WagonId], free_bays: u32) -> Vec<WagonId> {
    let take = (free_bays as usize).min(queue.len());
    queue[..take].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_until_capacity_exhausted() {
        let queue = vec![WagonId::new("a"), WagonId::new("b"), WagonId::new("c")];
        let lengths = |id: &WagonId| match id.as_str() {
            "a" => 10.0,
            "b" => 15.0,
            _ => 20.0,
        };
        let batch = pack_by_capacity(&queue, &lengths, 26.0);
        assert_eq!(batch, vec![WagonId::new("a"), WagonId::new("b")]);
    }

    #[test]
    fn bay_count_caps_batch_size() {
        let queue = vec![WagonId::new("a"), WagonId::new("b"), WagonId::new("c")];
        assert_eq!(pack_by_bay_count(&queue, 2), vec![WagonId::new("a"), WagonId::new("b")]);
        assert_eq!(pack_by_bay_count(&queue, 10), queue);
    }
}
