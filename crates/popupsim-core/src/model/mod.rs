// SPDX-License-Identifier: Apache-2.0
//! The data model: wagons, locomotives, tracks, workshops, rakes, routes.

mod coupler;
mod locomotive;
mod rake;
mod route;
mod track;
mod wagon;
mod workshop;

pub use coupler::Coupler;
pub use locomotive::{Locomotive, LocoStatus};
pub use rake::Rake;
pub use route::RouteTable;
pub(crate) use track::CapacityWaiter;
pub use track::{Track, TrackKind};
pub use wagon::{Wagon, WagonStatus};
pub use workshop::Workshop;
