//! Persistent storage core for a nanosatellite flight-software framework.
//!
//! This crate manages three co-resident data collections on constrained,
//! heterogeneous non-volatile memory (raw NOR flash plus ferroelectric
//! RAM) shared between an on-board computer's subsystems:
//!
//! - a **status table** of fixed-width system variables, optionally
//!   triple-written for single-bit-upset tolerance ([`status`]);
//! - a **flight plan**: a time-indexed queue of deferred commands, backed
//!   by an in-RAM translation look-aside buffer that avoids flash erases
//!   on lookup and delete ([`flight_plan`]);
//! - a **payload data store**: append-only, per-payload sample buffers
//!   with schema-described record layouts ([`payload`]).
//!
//! All three are reachable only through [`repository::Repository`], which
//! serializes every call through one mutex and maintains the derived
//! counters (`fpl_queue`, per-payload write cursors) consumers rely on.
//!
//! # Media backends
//!
//! The crate never talks to flash or FRAM directly; it goes through the
//! [`media::FlashMedia`]/[`media::FramMedia`] traits. [`media::hardware`]
//! implements them over a blocking SPI NOR flash and FRAM pair via
//! `embedded-hal`; [`media::simulation`] implements them over in-memory
//! byte arrays, so the same engine code runs identically under a hosted
//! simulator as it does on actual hardware.
//!
//! ```rust
//! use nanosat_storage_core::config::MediaGeometry;
//! use nanosat_storage_core::media::simulation::FixedSimulatedMedia;
//! use nanosat_storage_core::repository::Repository;
//! use nanosat_storage_core::value32::Value32;
//!
//! let geometry = MediaGeometry::new(0, 8, 1, 1)
//!     .with_section(2048)
//!     .with_page(512)
//!     .with_fram_size(512);
//!
//! let mut flash_buf = [0xFFu8; 2048 * 8];
//! let mut fram_buf = [0u8; 512];
//! let flash = FixedSimulatedMedia::<512, 2048>::new(&mut flash_buf, &mut []);
//! let fram = FixedSimulatedMedia::<512, 2048>::new(&mut [], &mut fram_buf);
//!
//! let repo = Repository::storage_init(geometry, flash, fram);
//! repo.storage_table_status_init(4, &[], true).unwrap();
//! repo.status_set_value_idx(0, Value32::from_i32(42)).unwrap();
//! assert_eq!(repo.status_get_value_idx(0).unwrap().as_i32(), 42);
//! ```
//!
//! # Non-goals
//!
//! No crash-consistent journaling beyond the durability property
//! documented in [`error`]; no wear-leveling across flash sections; no
//! multi-process concurrent access (single in-process owner, protected
//! by one mutex).
#![cfg_attr(not(feature = "std"), no_std)]
// rustc lints.
#![warn(
    bare_trait_objects,
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
    unused_results
)]

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod flight_plan;
pub mod map;
pub mod media;
pub mod payload;
pub mod repository;
pub mod status;
pub mod value32;

pub use config::{FpTlbLocation, MediaGeometry};
pub use error::{MediaError, StorageError, StorageResult};
pub use map::AddressMap;
pub use repository::Repository;
pub use value32::Value32;
