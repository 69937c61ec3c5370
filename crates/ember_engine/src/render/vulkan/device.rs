//! Adapter selection and logical device creation

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};
use std::collections::HashSet;
use std::ffi::CStr;

use super::{RenderError, RenderResult};

/// Resolved queue family indices for a selected adapter
///
/// Graphics and present capability may land on the same family or on two
/// different ones; both indices are recorded separately either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilySelection {
    /// Index of the first graphics-capable queue family
    pub graphics: u32,
    /// Index of the first present-capable queue family for the target surface
    pub present: u32,
}

/// A physical GPU with its capability snapshot, read-only after enumeration
pub struct AdapterCandidate {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Resolved queue family selection
    pub queue_families: QueueFamilySelection,
    /// Memory heap/type layout, needed for buffer allocation
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl AdapterCandidate {
    /// Enumerate adapters, filter to suitable ones, and pick the best
    ///
    /// Suitability requires a graphics queue family, a present-capable family
    /// for `surface`, the swapchain extension, and at least one surface format
    /// and present mode. Among suitable adapters, discrete GPUs are preferred
    /// over integrated, with enumeration order breaking ties. Fails with
    /// [`RenderError::NoSuitableDevice`] when nothing passes the filter.
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> RenderResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(RenderError::Api)?
        };

        let mut best: Option<(u32, AdapterCandidate)> = None;
        for device in devices {
            let Some(candidate) = Self::evaluate(instance, device, surface, surface_loader)?
            else {
                continue;
            };
            let rank = adapter_rank(candidate.properties.device_type);
            if best.as_ref().map_or(true, |(best_rank, _)| rank < *best_rank) {
                best = Some((rank, candidate));
            }
        }

        let (_, candidate) = best.ok_or(RenderError::NoSuitableDevice)?;
        log::info!("selected GPU: {}", unsafe {
            CStr::from_ptr(candidate.properties.device_name.as_ptr()).to_string_lossy()
        });
        Ok(candidate)
    }

    /// Evaluate one adapter; `Ok(None)` means "unsuitable", errors are API failures
    fn evaluate(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> RenderResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let queue_family_props =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut present_support = Vec::with_capacity(queue_family_props.len());
        for index in 0..queue_family_props.len() as u32 {
            let supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(RenderError::Api)?
            };
            present_support.push(supported);
        }

        let Some(queue_families) = find_queue_families(&queue_family_props, &present_support)
        else {
            return Ok(None);
        };

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(RenderError::Api)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(RenderError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(RenderError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Ok(None);
        }

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(device) };

        Ok(Some(Self {
            device,
            properties,
            features,
            queue_families,
            memory_properties,
        }))
    }
}

/// Ordering preference among suitable adapters: lower ranks first
fn adapter_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        _ => 2,
    }
}

/// Find the first family satisfying each required capability
///
/// Ties are broken by lowest index. Returns `None` unless *both* a graphics
/// family and a present family exist; a partially populated selection is
/// never produced.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<QueueFamilySelection> {
    debug_assert_eq!(families.len(), present_support.len());

    let graphics = families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))?;
    let present = present_support.iter().position(|&supported| supported)?;

    Some(QueueFamilySelection {
        graphics: graphics as u32,
        present: present as u32,
    })
}

/// The GPU execution context: logical device plus its queues
///
/// Owned by the graphics context; every other component borrows it for the
/// duration of the context's lifetime.
pub struct ExecutionContext {
    /// Logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
    /// Snapshot of the adapter's memory layout
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl ExecutionContext {
    /// Create the logical device and retrieve its queues
    ///
    /// One queue is requested per *unique* family: when graphics and present
    /// share a family, a single create request is issued and both roles read
    /// the same queue handle. Driver rejection is fatal and non-retryable.
    pub fn new(instance: &Instance, adapter: &AdapterCandidate) -> RenderResult<Self> {
        let selection = adapter.queue_families;
        let unique_families: HashSet<u32> =
            [selection.graphics, selection.present].iter().copied().collect();

        let queue_priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(adapter.device, &create_info, None)
                .map_err(RenderError::DeviceCreation)?
        };

        let graphics_queue = unsafe { device.get_device_queue(selection.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(selection.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: selection.graphics,
            present_family: selection.present,
            swapchain_loader,
            memory_properties: adapter.memory_properties,
        })
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        unsafe {
            // All submitted work must retire before the device goes away
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn picks_lowest_index_for_each_capability() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let present = [true, false, true];

        let selection = find_queue_families(&families, &present).unwrap();
        assert_eq!(selection.graphics, 1);
        assert_eq!(selection.present, 0);
    }

    #[test]
    fn shared_family_is_recorded_for_both_roles() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let present = [true];

        let selection = find_queue_families(&families, &present).unwrap();
        assert_eq!(selection.graphics, selection.present);
    }

    #[test]
    fn never_returns_partial_selection() {
        // Graphics available but no present support anywhere
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(find_queue_families(&families, &[false]).is_none());

        // Present available but no graphics family
        let families = [family(vk::QueueFlags::TRANSFER)];
        assert!(find_queue_families(&families, &[true]).is_none());

        // Nothing at all
        assert!(find_queue_families(&[], &[]).is_none());
    }

    #[test]
    fn discrete_gpus_rank_ahead_of_integrated() {
        assert!(
            adapter_rank(vk::PhysicalDeviceType::DISCRETE_GPU)
                < adapter_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            adapter_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
                < adapter_rank(vk::PhysicalDeviceType::CPU)
        );
    }
}
