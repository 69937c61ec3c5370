// Compiles the GLSL sources in shaders/ to SPIR-V next to them.
// Skips quietly when glslc is not installed; the precompiled .spv files
// are loaded at runtime, so a missing compiler only matters when the
// sources changed.

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders");

    let shader_dir = Path::new("shaders");
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("vert" | "frag")
        );
        if !is_shader {
            continue;
        }

        let Some(stem) = path.file_stem() else {
            continue;
        };
        let out_file = shader_dir.join(stem).with_extension("spv");

        let status = Command::new("glslc")
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();

        match status {
            Ok(status) if status.success() => {
                println!("cargo:warning=compiled {}", out_file.display());
            }
            Ok(status) => {
                println!("cargo:warning=glslc failed on {} ({status})", path.display());
            }
            Err(_) => {
                // glslc not on PATH
                return;
            }
        }
    }
}
