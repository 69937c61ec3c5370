//! SPIR-V shader loading and module creation
//!
//! The core consumes precompiled shader bytecode only; source compilation is
//! out of scope.

use ash::{vk, Device};
use std::path::{Path, PathBuf};

use super::{RenderError, RenderResult};

/// Loads precompiled SPIR-V blobs by file name from a base directory
pub struct ShaderCatalog {
    base_dir: PathBuf,
}

impl ShaderCatalog {
    /// Create a catalog rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Read a shader binary by file name
    ///
    /// Missing or malformed (non-u32-aligned) files fail with
    /// [`RenderError::ShaderLoad`], which is fatal to the pipeline build.
    pub fn load(&self, file_name: &str) -> RenderResult<Vec<u8>> {
        let path = self.base_dir.join(file_name);
        let bytes = std::fs::read(&path).map_err(|e| RenderError::ShaderLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(RenderError::ShaderLoad {
                path: path.display().to_string(),
                reason: format!("not valid SPIR-V ({} bytes)", bytes.len()),
            });
        }

        Ok(bytes)
    }

    /// The directory this catalog resolves against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, bytes: &[u8]) -> RenderResult<Self> {
        // SPIR-V words are u32-aligned; the catalog validates length, this
        // guards direct callers.
        let (prefix, code, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(RenderError::Initialization(
                "SPIR-V bytecode is not u32-aligned".to_string(),
            ));
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(RenderError::PipelineCreation)?
        };

        Ok(Self { device, module })
    }

    /// Shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Build the pipeline stage info for this module
    pub fn stage_info(
        &self,
        stage: vk::ShaderStageFlags,
        entry_point: &std::ffi::CStr,
    ) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(entry_point)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_shader_file_is_a_load_error() {
        let catalog = ShaderCatalog::new("/nonexistent/shader/dir");
        let err = catalog.load("vert.spv").unwrap_err();
        match err {
            RenderError::ShaderLoad { path, .. } => {
                assert!(path.ends_with("vert.spv"));
            }
            other => panic!("expected ShaderLoad, got {other:?}"),
        }
    }

    #[test]
    fn truncated_bytecode_is_a_load_error() {
        let dir = std::env::temp_dir().join("ember_shader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.spv");
        std::fs::write(&path, [0u8; 7]).unwrap();

        let catalog = ShaderCatalog::new(&dir);
        assert!(matches!(
            catalog.load("bad.spv"),
            Err(RenderError::ShaderLoad { .. })
        ));
    }

    #[test]
    fn aligned_bytecode_loads() {
        let dir = std::env::temp_dir().join("ember_shader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ok.spv");
        // SPIR-V magic number followed by one padding word
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0]).unwrap();

        let catalog = ShaderCatalog::new(&dir);
        let bytes = catalog.load("ok.spv").unwrap();
        assert_eq!(bytes.len(), 8);
    }
}
