// SPDX-License-Identifier: Apache-2.0
//! Newtype identifiers for every entity kind in the data model.
//!
//! All identifiers are scenario-supplied strings. Wrapping them keeps a
//! `TrackId` from being accepted where a `WagonId` is expected even though
//! both are backed by `String`.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw scenario identifier.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrows the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }
    };
}

id_newtype!(
    /// Identifies a wagon, unique for the lifetime of a run.
    WagonId
);
id_newtype!(
    /// Identifies a locomotive.
    LocoId
);
id_newtype!(
    /// Identifies a track.
    TrackId
);
id_newtype!(
    /// Identifies a workshop.
    WorkshopId
);
id_newtype!(
    /// Identifies a scheduled train.
    TrainId
);
id_newtype!(
    /// Identifies a route between two tracks.
    RouteId
);
