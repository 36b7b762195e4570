// SPDX-License-Identifier: Apache-2.0
//! Rake-wide coupler compatibility checks (§4.6).

use crate::model::{Coupler, Wagon};

/// Checks a proposed rake `[w_1, .., w_n]` behind a locomotive whose
/// rake-facing coupler is `loco_coupler`.
///
/// Returns `Ok(())` if every adjacent pair (including loco-to-first-wagon)
/// is compatible, or `Err(index)` with the index of the first incompatible
/// wagon in `wagons` (the wagon whose *leading* coupler failed to mate with
/// whatever precedes it) so callers can split the batch at that point.
pub fn validate(loco_coupler: Coupler, wagons: &[&Wagon]) -> Result<(), usize> {
    if wagons.is_empty() {
        return Ok(());
    }
    if !Coupler::compatible(loco_coupler, wagons[0].coupler_a) {
        return Err(0);
    }
    for i in 0..wagons.len() - 1 {
        if !Coupler::compatible(wagons[i].coupler_b, wagons[i + 1].coupler_a) {
            return Err(i + 1);
        }
    }
    Ok(())
}

/// Validates a rake and, on failure, returns the longest valid prefix
/// length (possibly zero) so a batch can be split: the compatible prefix is
/// processed, the remainder re-queued (§4.11).
#[must_use]
pub fn longest_valid_prefix(loco_coupler: Coupler, wagons: &[&Wagon]) -> usize {
    match validate(loco_coupler, wagons) {
        Ok(()) => wagons.len(),
        Err(bad_index) => bad_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WagonId;
    use crate::time::SimTime;

    fn wagon(id: &str, a: Coupler, b: Coupler) -> Wagon {
        Wagon::new(WagonId::new(id), 10.0, a, b, false, true, SimTime::ZERO)
    }

    #[test]
    fn full_screw_rake_valid() {
        let w1 = wagon("w1", Coupler::Screw, Coupler::Screw);
        let w2 = wagon("w2", Coupler::Screw, Coupler::Screw);
        assert!(validate(Coupler::Screw, &[&w1, &w2]).is_ok());
    }

    #[test]
    fn mismatch_splits_at_first_bad_wagon() {
        let w1 = wagon("w1", Coupler::Screw, Coupler::Screw);
        let w2 = wagon("w2", Coupler::Dac, Coupler::Dac);
        let w3 = wagon("w3", Coupler::Screw, Coupler::Screw);
        assert_eq!(longest_valid_prefix(Coupler::Screw, &[&w1, &w2, &w3]), 1);
    }

    #[test]
    fn hybrid_bridges_loco_and_wagon() {
        let w1 = wagon("w1", Coupler::Hybrid, Coupler::Screw);
        assert!(validate(Coupler::Dac, &[&w1]).is_ok());
    }
}
