//! Swapchain negotiation and lifecycle
//!
//! The swapchain is destroyed and rebuilt wholesale whenever the framebuffer
//! size changes or the presentation engine reports staleness; it is never
//! patched incrementally. The negotiation rules live in free functions so the
//! policies are testable without a GPU.

use ash::extensions::khr::Surface;
use ash::{vk, Device};

use super::{ExecutionContext, RenderError, RenderResult};
use crate::window::RenderWindow;

/// Negotiate the present mode
///
/// MAILBOX gives low-latency triple buffering when the driver offers it;
/// otherwise fall back to FIFO, which never tears and is universally
/// supported. IMMEDIATE is never chosen.
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    available
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Negotiate the surface format: 8-bit BGRA sRGB when offered, else the first
///
/// Adapter filtering guarantees `available` is non-empty.
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(available[0])
}

/// Negotiate the image count: one over the minimum, clamped to the maximum
///
/// Requesting only the minimum risks stalling on the driver; `max_image_count`
/// of zero means unbounded.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let requested = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        requested.min(caps.max_image_count)
    } else {
        requested
    }
}

/// Negotiate the extent
///
/// The surface's `current_extent` wins unless it carries the `u32::MAX`
/// track-window sentinel, in which case the window-reported framebuffer size
/// is clamped to the surface's min/max capability.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer_size
                .0
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer_size
                .1
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Block until the window reports a nonzero framebuffer size
///
/// A minimized window reports (0, 0), which cannot back a swapchain. This is
/// an intentional suspension point: keep pumping window events until a usable
/// size appears.
pub fn wait_for_valid_extent(window: &mut dyn RenderWindow) -> (u32, u32) {
    let (mut width, mut height) = window.framebuffer_size();
    while width == 0 || height == 0 {
        window.poll_events();
        let size = window.framebuffer_size();
        width = size.0;
        height = size.1;
    }
    (width, height)
}

/// The presentable image chain with its views and negotiated parameters
pub struct SwapchainState {
    device: Device,
    loader: ash::extensions::khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl SwapchainState {
    /// Build a swapchain against the current surface capabilities
    ///
    /// Pass the previous chain's handle as `old_swapchain` during a rebuild so
    /// the driver can recycle its images; `vk::SwapchainKHR::null()` for the
    /// initial build.
    pub fn new(
        context: &ExecutionContext,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        framebuffer_size: (u32, u32),
        old_swapchain: vk::SwapchainKHR,
    ) -> RenderResult<Self> {
        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(RenderError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(RenderError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(RenderError::Api)?
        };

        let format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&caps, framebuffer_size);
        let image_count = choose_image_count(&caps);

        log::debug!(
            "swapchain: {}x{} {:?} {:?} x{}",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            image_count
        );

        // Graphics and present may live on different families; the images
        // then need concurrent sharing between the two.
        let family_indices = [context.graphics_family, context.present_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        if context.graphics_family != context.present_family {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let loader = context.swapchain_loader.clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(RenderError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(RenderError::Api)?
        };

        let device = context.device.clone();
        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.create_image_view(&view_info, None) }
            })
            .collect();
        let image_views = image_views.map_err(RenderError::Api)?;

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Negotiated surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Negotiated extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Per-image views, in image order
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images in the chain
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for SwapchainState {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn prefers_mailbox_when_available() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn falls_back_to_fifo_when_mailbox_unsupported() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);

        // FIFO is the answer even when the driver only reports FIFO
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn prefers_bgra_srgb_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R16G16B16A16_SFLOAT,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        // min=2 max=4: request 3
        assert_eq!(choose_image_count(&caps(2, 4)), 3);
        // min=3 max=3: clamp to the maximum
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        // max=0 means unbounded
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
    }

    #[test]
    fn negotiation_is_idempotent_under_stable_input() {
        let capabilities = caps(2, 4);
        let modes = [vk::PresentModeKHR::FIFO];
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let first = (
            choose_image_count(&capabilities),
            choose_surface_format(&formats),
            choose_present_mode(&modes),
            choose_extent(&capabilities, (800, 600)),
        );
        let second = (
            choose_image_count(&capabilities),
            choose_surface_format(&formats),
            choose_present_mode(&modes),
            choose_extent(&capabilities, (800, 600)),
        );
        assert_eq!(first.0, second.0);
        assert_eq!(first.1.format, second.1.format);
        assert_eq!(first.1.color_space, second.1.color_space);
        assert_eq!(first.2, second.2);
        assert_eq!((first.3.width, first.3.height), (second.3.width, second.3.height));
    }

    #[test]
    fn extent_uses_surface_value_unless_sentinel() {
        let mut capabilities = caps(2, 4);
        capabilities.current_extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let extent = choose_extent(&capabilities, (800, 600));
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn sentinel_extent_clamps_framebuffer_size() {
        let capabilities = caps(2, 4); // current_extent is the sentinel
        let extent = choose_extent(&capabilities, (8000, 600));
        assert_eq!((extent.width, extent.height), (4096, 600));
    }

    /// Window double reporting (0,0) for a few polls, then a real size
    struct MinimizedWindow {
        polls_until_restore: u32,
        restored_size: (u32, u32),
    }

    impl RenderWindow for MinimizedWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            if self.polls_until_restore == 0 {
                self.restored_size
            } else {
                (0, 0)
            }
        }

        fn poll_events(&mut self) {
            self.polls_until_restore = self.polls_until_restore.saturating_sub(1);
        }

        fn consume_resized_flag(&mut self) -> bool {
            false
        }

        fn should_close(&self) -> bool {
            false
        }
    }

    #[test]
    fn zero_size_rebuild_blocks_until_window_restored() {
        let mut window = MinimizedWindow {
            polls_until_restore: 3,
            restored_size: (800, 600),
        };
        assert_eq!(wait_for_valid_extent(&mut window), (800, 600));
        assert_eq!(window.polls_until_restore, 0);
    }

    #[test]
    fn nonzero_window_passes_straight_through() {
        let mut window = MinimizedWindow {
            polls_until_restore: 0,
            restored_size: (1024, 768),
        };
        assert_eq!(wait_for_valid_extent(&mut window), (1024, 768));
    }
}
