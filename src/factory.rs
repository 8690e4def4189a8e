//! Device and context lifecycle.

use crate::config::PetalSonicFactoryDesc;
use crate::device::{AudioDevice, ContextHandle, DeviceHandle};
use crate::error::{PetalSonicError, Result};
use crate::gate::check_device_error;
use crate::math::Vec3;
use crate::sound::PetalSonicSound;
use crate::source::SampleSource;
use std::rc::Rc;

/// What a factory's sounds can do and how they are fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryCapabilities {
    /// Sounds can be positioned in 3D
    pub supports_3d: bool,
    /// Sounds can be loaded from a file path
    pub can_load_file: bool,
    /// Sounds can be decoded from a streaming source
    pub can_load_stream: bool,
    /// Sounds can be loaded from a decoded [`SampleSource`]
    pub can_load_source: bool,
    /// [`PetalSonicFactory::update`] must be called periodically
    pub needs_update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactoryState {
    Uninitialized,
    Active {
        device: DeviceHandle,
        context: ContextHandle,
    },
}

/// Owner of the audio device and its rendering context.
///
/// A factory built with `setup = true` opens the device, creates a context and makes it
/// current; dropping it tears them down again. A factory built with `setup = false` is a
/// handle over a device someone else manages and destroys nothing.
///
/// # Example
///
/// ```no_run
/// use petalsonic_al::device::SoftDevice;
/// use petalsonic_al::source::MemorySource;
/// use petalsonic_al::{PetalSonicFactory, Vec3};
/// use std::rc::Rc;
///
/// let factory = PetalSonicFactory::new(Rc::new(SoftDevice::cpal()), true)?;
/// let mut source = MemorySource::from_f32_samples(&[0.0; 4800], 48000, 1);
/// let sound = factory.load_source(&mut source)?;
/// sound.set_pos(Vec3::new(2.0, 0.0, 0.0))?;
/// sound.play()?;
/// # Ok::<(), petalsonic_al::PetalSonicError>(())
/// ```
pub struct PetalSonicFactory {
    device: Rc<dyn AudioDevice>,
    state: FactoryState,
}

impl PetalSonicFactory {
    pub const CAPABILITIES: FactoryCapabilities = FactoryCapabilities {
        supports_3d: true,
        can_load_file: false,
        can_load_stream: false,
        can_load_source: true,
        needs_update: false,
    };

    pub fn new(device: Rc<dyn AudioDevice>, setup: bool) -> Result<Self> {
        Self::with_desc(device, setup, PetalSonicFactoryDesc::default())
    }

    pub fn with_desc(
        device: Rc<dyn AudioDevice>,
        setup: bool,
        desc: PetalSonicFactoryDesc,
    ) -> Result<Self> {
        if !setup {
            log::debug!("Factory created over an externally managed device");
            return Ok(Self {
                device,
                state: FactoryState::Uninitialized,
            });
        }

        let handle = device.open_device(desc.device_name.as_deref());
        let context = handle
            .and_then(|handle| device.create_context(handle, &desc.context_attributes()));

        let (handle, context) = match (handle, context) {
            (Some(handle), Some(context)) => (handle, context),
            (handle, _) => {
                if let Some(handle) = handle {
                    device.close_device(handle);
                }
                return Err(PetalSonicError::Setup(
                    "Failed to initialize context or device".into(),
                ));
            }
        };

        device.make_context_current(Some(context));
        log::info!(
            "Audio device initialized ({} Hz, {} channels)",
            desc.sample_rate,
            desc.channels
        );

        Ok(Self {
            device,
            state: FactoryState::Active {
                device: handle,
                context,
            },
        })
    }

    pub fn capabilities(&self) -> FactoryCapabilities {
        Self::CAPABILITIES
    }

    /// True if this factory opened the device and owns its context.
    pub fn is_active(&self) -> bool {
        matches!(self.state, FactoryState::Active { .. })
    }

    pub fn device(&self) -> &Rc<dyn AudioDevice> {
        &self.device
    }

    /// Builds a sound from a decoded sample source.
    pub fn load_source(&self, source: &mut dyn SampleSource) -> Result<PetalSonicSound> {
        PetalSonicSound::new(self, source)
    }

    /// Places the listener. `forward` and `up` give its orientation.
    pub fn set_listener_pos(&self, position: Vec3, forward: Vec3, up: Vec3) -> Result<()> {
        self.device.listener_position(position);
        check_device_error(self.device.as_ref(), "setting listener position")?;
        self.device.listener_orientation(forward, up);
        check_device_error(self.device.as_ref(), "setting listener orientation")
    }

    /// Nothing to do: the device renders on its own clock.
    pub fn update(&self) {}
}

impl Drop for PetalSonicFactory {
    fn drop(&mut self) {
        // Only a factory that opened the device tears it down.
        let FactoryState::Active { device, context } = self.state else {
            return;
        };

        self.device.make_context_current(None);
        self.device.destroy_context(context);
        self.device.close_device(device);
        if let Some(code) = self.device.get_error() {
            log::warn!("Ignoring device error {:?} during audio shutdown", code);
        }
        self.state = FactoryState::Uninitialized;
        log::info!("Audio device shut down");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::device::{ContextAttributes, DeviceHandle, HEADLESS_DEVICE_NAME, SoftDevice};

    /// Active factory over a headless device, with the device for inspection.
    pub(crate) fn headless_factory() -> (PetalSonicFactory, Rc<SoftDevice>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = Rc::new(SoftDevice::headless());
        let factory = PetalSonicFactory::new(device.clone(), true).unwrap();
        (factory, device)
    }

    #[test]
    fn setup_opens_device_and_context() {
        let (factory, device) = headless_factory();
        assert!(factory.is_active());
        let stats = device.stats();
        assert_eq!(stats.devices_opened, 1);
        assert_eq!(stats.contexts_created, 1);
    }

    #[test]
    fn drop_tears_down_in_reverse_order() {
        let (factory, device) = headless_factory();
        drop(factory);

        let stats = device.stats();
        assert_eq!(stats.contexts_destroyed, 1);
        assert_eq!(stats.devices_closed, 1);
        // The device refuses out-of-order teardown, so nothing may be left pending.
        assert_eq!(device.get_error(), None);
    }

    #[test]
    fn failed_setup_leaves_nothing_open() {
        let device = Rc::new(SoftDevice::headless());
        let desc = PetalSonicFactoryDesc::default().device_name("no such device");
        let result = PetalSonicFactory::with_desc(device.clone(), true, desc);

        assert!(matches!(result, Err(PetalSonicError::Setup(_))));
        let stats = device.stats();
        assert_eq!(stats.devices_opened, 0);
        assert_eq!(stats.contexts_created, 0);
    }

    #[test]
    fn failed_context_closes_the_opened_device() {
        let device = Rc::new(SoftDevice::headless());
        let desc = PetalSonicFactoryDesc::default().sample_rate(0);
        let result = PetalSonicFactory::with_desc(device.clone(), true, desc);

        assert!(matches!(result, Err(PetalSonicError::Setup(_))));
        let stats = device.stats();
        assert_eq!(stats.devices_opened, 1);
        assert_eq!(stats.devices_closed, 1);
        assert_eq!(stats.contexts_created, 0);
    }

    #[test]
    fn refused_teardown_does_not_leave_errors_pending() {
        let (factory, device) = headless_factory();
        // A second context keeps the device from closing.
        let extra = device
            .create_context(DeviceHandle(1), &ContextAttributes::default())
            .unwrap();
        drop(factory);

        let stats = device.stats();
        assert_eq!(stats.contexts_destroyed, 1);
        assert_eq!(stats.devices_closed, 0);
        assert_eq!(device.get_error(), None);

        device.destroy_context(extra);
        assert!(device.close_device(DeviceHandle(1)));
    }

    #[test]
    fn named_headless_device_can_be_opened() {
        let device = Rc::new(SoftDevice::headless());
        let desc = PetalSonicFactoryDesc::default().device_name(HEADLESS_DEVICE_NAME);
        let factory = PetalSonicFactory::with_desc(device, true, desc).unwrap();
        assert!(factory.is_active());
    }

    #[test]
    fn non_owning_factory_destroys_nothing() {
        let (owner, device) = headless_factory();
        let handle = PetalSonicFactory::new(device.clone(), false).unwrap();
        assert!(!handle.is_active());
        assert_eq!(handle.capabilities(), owner.capabilities());
        drop(handle);

        let stats = device.stats();
        assert_eq!(stats.contexts_destroyed, 0);
        assert_eq!(stats.devices_closed, 0);
        drop(owner);
        assert_eq!(device.stats().devices_closed, 1);
    }

    #[test]
    fn reports_static_capabilities() {
        let factory = PetalSonicFactory::new(Rc::new(SoftDevice::headless()), false).unwrap();
        let caps = factory.capabilities();
        assert!(caps.supports_3d);
        assert!(!caps.can_load_file);
        assert!(!caps.can_load_stream);
        assert!(caps.can_load_source);
        assert!(!caps.needs_update);
    }

    #[test]
    fn listener_requires_a_context() {
        let factory = PetalSonicFactory::new(Rc::new(SoftDevice::headless()), false).unwrap();
        let err = factory
            .set_listener_pos(Vec3::ZERO, -Vec3::Z, Vec3::Y)
            .unwrap_err();
        assert_eq!(err.operation(), Some("setting listener position"));

        let (factory, _device) = headless_factory();
        factory
            .set_listener_pos(Vec3::new(1.0, 2.0, 3.0), -Vec3::Z, Vec3::Y)
            .unwrap();
    }
}
