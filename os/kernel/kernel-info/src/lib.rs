//! # Kernel Resource-Manager Configuration
//!
//! This crate is the authoritative source for the compile-time parameters
//! shared by the kernel's resource managers: the disk block cache
//! (`kernel-bcache`) and the physical page allocators (`kernel-alloc`).
//! Centralizing them here keeps the managers consistent with each other and
//! prevents configuration drift between subsystems.
//!
//! ## Overview
//!
//! The crate is organized into two modules:
//!
//! ### Parameters ([`params`])
//! Fixed sizing and tuning knobs:
//! * **Block cache**: block payload size, buffer-pool size, bucket count
//! * **Page allocator**: page size, maximum core count
//! * **Debugging aids**: junk-fill byte patterns for freshly allocated and
//!   freed pages
//!
//! All values are `const` and validated by compile-time assertions; an
//! invalid combination fails the build rather than the boot.
//!
//! ### Addresses ([`addr`])
//! The [`PhysAddr`] strongly-typed wrapper for physical addresses handed
//! out by the page allocators. A zero-cost `#[repr(transparent)]` newtype
//! that keeps raw integers out of allocator interfaces.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod addr;
pub mod params;

pub use addr::PhysAddr;
