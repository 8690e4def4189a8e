//! # PetalSonic AL
//!
//! An OpenAL-style sound playback backend: decoded samples go into device buffers once,
//! and any number of independently controlled 3D voices play them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use petalsonic_al::device::SoftDevice;
//! use petalsonic_al::source::MemorySource;
//! use petalsonic_al::*;
//! use std::rc::Rc;
//!
//! // Open the default output device and make its context current
//! let factory = PetalSonicFactory::new(Rc::new(SoftDevice::cpal()), true)?;
//!
//! // Upload one second of silence
//! let mut source = MemorySource::from_f32_samples(&[0.0; 48000], 48000, 1);
//! let footstep = factory.load_source(&mut source)?;
//!
//! // A second voice on the same buffer, placed elsewhere
//! let echo = footstep.try_clone()?;
//! footstep.set_pos(Vec3::new(-2.0, 0.0, 0.0))?;
//! echo.set_pos(Vec3::new(2.0, 0.0, 0.0))?;
//! echo.set_volume(0.5)?;
//!
//! footstep.play()?;
//! echo.play()?;
//! # Ok::<(), PetalSonicError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`PetalSonicFactory`]**: opens and closes the device and its rendering context
//! - **[`PetalSonicSound`]**: one voice on a shared buffer, with transport and 3D controls
//! - **[`AudioDevice`](device::AudioDevice)**: the OpenAL-style device interface
//! - **[`SoftDevice`](device::SoftDevice)**: in-process device rendering through cpal
//! - **[`SampleSource`](source::SampleSource)**: decoded PCM input
//!
//! ## Threading
//!
//! Factories and sounds are single-threaded (`!Send`). All calls are synchronous device
//! calls; audio advances on the device's own clock. A device failure surfaces as
//! [`PetalSonicError::DeviceOperation`] from the call that caused it.

pub mod config;
pub mod device;
pub mod error;
pub mod factory;
pub mod format;
pub mod gate;
pub mod math;
pub mod sound;
pub mod source;

pub use config::PetalSonicFactoryDesc;
pub use error::PetalSonicError;
pub use factory::{FactoryCapabilities, PetalSonicFactory};
pub use math::Vec3;
pub use sound::PetalSonicSound;
