//! NTP-style offset estimation between a peer and the relay.
//!
//! The relay side is stateless ([`respond`]); the requester collects samples
//! with [`compute_sample`] and smooths them in a [`ClockSyncEstimator`].

pub mod estimator;
pub mod sample;

pub use estimator::{ClockSyncEstimator, SYNC_MIN_SAMPLES, SYNC_WINDOW};
pub use sample::{SyncSample, compute_sample, respond};
