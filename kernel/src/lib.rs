#![cfg_attr(not(test), no_std)]

//! Power management firmware for the system control processor
//!
//! The SCP is a small always-on core next to the application processors.
//! It answers SCPI requests from trusted firmware and the rich OS over a
//! hardware message box, sequences power to the CPU subsystem, forwards
//! interrupts it does not own, and drives the PMIC through suspend,
//! resume, shutdown and reset.
//!
//! Everything hangs off [`Scp`], which is generic over a [`Platform`]. The
//! `boot` crate picks the platform, calls [`Scp::init`], routes the external
//! interrupt to [`Scp::handle_interrupt`] and idles.

pub mod config;
pub mod css;
pub mod firmware;
pub mod intc;
pub mod interrupts;
pub mod ipc;
pub mod irqf;
pub mod mailbox;
pub mod mmio;
pub mod platform;
pub mod scpi;
pub mod serial;
pub mod system;
pub mod watchdog;

#[cfg(test)]
mod sim;

pub use firmware::Scp;
pub use platform::Platform;
pub use system::SystemState;
