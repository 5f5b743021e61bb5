//! Named device instances.

use crate::config::{DeviceConfig, RegistryConfig};
use crate::device::RamdumpDevice;
use crate::error::{RegistryError, RegistryResult};
use crate::types::DeviceId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{error, info};

/// Creates and tracks ramdump devices.
///
/// The registry is set up lazily on the first [`DeviceRegistry::create`]
/// and hands out device minors lowest-free, up to
/// [`RegistryConfig::max_devices`].
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    config: RegistryConfig,
    devices: Mutex<Option<BTreeMap<DeviceId, RamdumpDevice>>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            devices: Mutex::new(None),
        }
    }

    /// Returns the registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns true once the first device has been created.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.devices.lock().is_some()
    }

    /// Returns the number of live devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.lock().as_ref().map_or(0, BTreeMap::len)
    }

    /// Returns true if no device is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a device named `<prefix>_<name>`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidName`] if `name` is empty
    /// - [`RegistryError::AlreadyExists`] if the name is taken
    /// - [`RegistryError::NoMinorsLeft`] if every minor is in use
    pub fn create(&self, name: &str, config: DeviceConfig) -> RegistryResult<RamdumpDevice> {
        if name.is_empty() {
            error!("invalid ramdump device name");
            return Err(RegistryError::InvalidName);
        }

        let full_name = format!("{}_{}", self.config.name_prefix, name);
        let mut guard = self.devices.lock();
        let devices = guard.get_or_insert_with(|| {
            info!(prefix = %self.config.name_prefix, "ramdump device class initialized");
            BTreeMap::new()
        });

        if devices.values().any(|d| d.name() == full_name) {
            return Err(RegistryError::AlreadyExists { name: full_name });
        }

        let max = self.config.max_devices;
        let minor = (0..max)
            .filter_map(|m| u32::try_from(m).ok())
            .map(DeviceId::new)
            .find(|id| !devices.contains_key(id))
            .ok_or_else(|| {
                error!(max, "no more minor numbers left");
                RegistryError::NoMinorsLeft { max }
            })?;

        let device = RamdumpDevice::new(minor, full_name, config);
        devices.insert(minor, device.clone());
        info!(device = %device.name(), %minor, "ramdump device created");
        Ok(device)
    }

    /// Looks up a device by its short name or full node name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<RamdumpDevice> {
        let full_name = format!("{}_{}", self.config.name_prefix, name);
        self.devices.lock().as_ref().and_then(|devices| {
            devices
                .values()
                .find(|d| d.name() == name || d.name() == full_name)
                .cloned()
        })
    }

    /// Destroys a device and frees its minor.
    ///
    /// Blocked readers wake with [`crate::ReadError::Closed`]. Returns
    /// false if the device is not registered here.
    pub fn destroy(&self, device: &RamdumpDevice) -> bool {
        let removed = {
            let mut guard = self.devices.lock();
            let Some(devices) = guard.as_mut() else {
                return false;
            };
            match devices.get(&device.id()) {
                Some(existing) if existing.same_device(device) => devices.remove(&device.id()),
                _ => None,
            }
        };

        match removed {
            Some(device) => {
                device.mark_destroyed();
                info!(device = %device.name(), "ramdump device destroyed");
                true
            }
            None => false,
        }
    }

    /// Destroys every device and tears the registry down.
    ///
    /// The next [`DeviceRegistry::create`] sets it up again.
    pub fn shutdown(&self) {
        let devices = self.devices.lock().take();
        for device in devices.into_iter().flat_map(BTreeMap::into_values) {
            device.mark_destroyed();
        }
        info!("ramdump device class destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_initialization() {
        let registry = DeviceRegistry::default();
        assert!(!registry.is_initialized());
        assert!(registry.is_empty());

        registry.create("modem", DeviceConfig::default()).unwrap();
        assert!(registry.is_initialized());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_prefixed() {
        let registry = DeviceRegistry::default();
        let device = registry.create("adsp", DeviceConfig::default()).unwrap();
        assert_eq!(device.name(), "ramdump_adsp");
        assert_eq!(device.id(), DeviceId::new(0));
    }

    #[test]
    fn empty_name_rejected() {
        let registry = DeviceRegistry::default();
        assert!(matches!(
            registry.create("", DeviceConfig::default()),
            Err(RegistryError::InvalidName)
        ));
        assert!(!registry.is_initialized());
    }

    #[test]
    fn duplicate_name_rejected() {
        let registry = DeviceRegistry::default();
        registry.create("modem", DeviceConfig::default()).unwrap();
        let err = registry.create("modem", DeviceConfig::default()).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists { name } if name == "ramdump_modem"));
    }

    #[test]
    fn minors_exhausted_and_reused() {
        let registry = DeviceRegistry::new(RegistryConfig::new().max_devices(2));
        let a = registry.create("a", DeviceConfig::default()).unwrap();
        let b = registry.create("b", DeviceConfig::default()).unwrap();
        assert_eq!(b.id().minor(), 1);

        assert!(matches!(
            registry.create("c", DeviceConfig::default()),
            Err(RegistryError::NoMinorsLeft { max: 2 })
        ));

        assert!(registry.destroy(&a));
        assert!(a.is_destroyed());
        let c = registry.create("c", DeviceConfig::default()).unwrap();
        assert_eq!(c.id().minor(), 0);
    }

    #[test]
    fn lookup_by_short_and_full_name() {
        let registry = DeviceRegistry::default();
        let device = registry.create("wcnss", DeviceConfig::default()).unwrap();

        assert_eq!(registry.lookup("wcnss").unwrap().id(), device.id());
        assert_eq!(registry.lookup("ramdump_wcnss").unwrap().id(), device.id());
        assert!(registry.lookup("venus").is_none());
    }

    #[test]
    fn destroy_foreign_device_is_noop() {
        let registry = DeviceRegistry::default();
        let other = DeviceRegistry::default();
        registry.create("a", DeviceConfig::default()).unwrap();
        let foreign = other.create("a", DeviceConfig::default()).unwrap();

        assert!(!registry.destroy(&foreign));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn shutdown_destroys_everything() {
        let registry = DeviceRegistry::default();
        let a = registry.create("a", DeviceConfig::default()).unwrap();
        let b = registry.create("b", DeviceConfig::default()).unwrap();

        registry.shutdown();
        assert!(a.is_destroyed());
        assert!(b.is_destroyed());
        assert!(!registry.is_initialized());
    }
}
