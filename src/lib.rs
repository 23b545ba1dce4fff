//! A validator-side daemon bridging Stellar deposits and chain-L1 burns.
//!
//! See `spec.md` / `SPEC_FULL.md` at the repository root for the full
//! behavioral specification. The module layout mirrors the teacher's
//! `engine/src` split: ambient concerns (`config`, `logging`, `health`,
//! `error`, `persistence`) alongside the domain core (`model`, `classifier`,
//! `wallet`, `subclient`, `transfer`, `event_loop`, `bootstrap`).

pub mod bootstrap;
pub mod classifier;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod health;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod subclient;
pub mod transfer;
pub mod wallet;
