// SPDX-License-Identifier: Apache-2.0
//! The four coordinator processes (§4.9-§4.12).
//!
//! Each is a state machine implementing [`crate::executor::Process`]; none
//! of them call each other directly, only through the shared tracks,
//! locomotive pool, workshop bays, and [`crate::coordination::CoordinationService`]
//! reachable from [`crate::simulation::Simulation`].

mod arrival;
mod collection;
mod parking;
mod workshop;

pub use arrival::ArrivalCoordinator;
pub use collection::CollectionCoordinator;
pub use parking::ParkingCoordinator;
pub use workshop::WorkshopCoordinator;
