// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// A mechanical end-fitting on a wagon or locomotive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coupler {
    /// The legacy screw coupler.
    Screw,
    /// Digital Automatic Coupler.
    Dac,
    /// Couples to either screw or DAC.
    Hybrid,
}

impl Coupler {
    /// True iff `a` and `b` can be coupled: equal type, or either is hybrid.
    #[must_use]
    pub fn compatible(a: Self, b: Self) -> bool {
        a == b || a == Self::Hybrid || b == Self::Hybrid
    }
}

#[cfg(test)]
mod tests {
    use super::Coupler::{Dac, Hybrid, Screw};
    use super::*;

    #[test]
    fn same_type_compatible() {
        assert!(Coupler::compatible(Screw, Screw));
        assert!(Coupler::compatible(Dac, Dac));
    }

    #[test]
    fn hybrid_bridges_both() {
        assert!(Coupler::compatible(Hybrid, Screw));
        assert!(Coupler::compatible(Dac, Hybrid));
    }

    #[test]
    fn screw_and_dac_incompatible() {
        assert!(!Coupler::compatible(Screw, Dac));
    }
}
