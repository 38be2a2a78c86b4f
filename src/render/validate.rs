//! WGSL front end shared by both devices.
//!
//! Each stage of a program is parsed and validated with naga, then checked for
//! the entry point the pipelines are built against.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::ShaderStage;

use super::{ProgramSource, ShaderError};

pub(crate) const VERTEX_ENTRY: &str = "vs_main";
pub(crate) const FRAGMENT_ENTRY: &str = "fs_main";

/// Parses and validates both stages of `source`.
pub(crate) fn validate_program(source: &ProgramSource) -> Result<(), ShaderError> {
    validate_stage(&source.vertex, ShaderStage::Vertex, VERTEX_ENTRY).map_err(|message| {
        ShaderError::Compile {
            name: source.name.clone(),
            message: format!("vertex stage: {message}"),
        }
    })?;
    validate_stage(&source.fragment, ShaderStage::Fragment, FRAGMENT_ENTRY).map_err(|message| {
        ShaderError::Compile {
            name: source.name.clone(),
            message: format!("fragment stage: {message}"),
        }
    })
}

fn validate_stage(code: &str, stage: ShaderStage, entry: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(code).map_err(|err| err.emit_to_string(code))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| err.emit_to_string(code))?;
    let found = module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry && ep.stage == stage);
    if found {
        Ok(())
    } else {
        Err(format!("missing {stage:?} entry point `{entry}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetDir;
    use crate::config::DEFAULT_ASSET_DIR;
    use crate::render::shaders::STOCK_SHADER;
    use crate::render::ShaderVariant;

    const VERTEX: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> {\n    return vec4<f32>(0.0);\n}\n";
    const FRAGMENT: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n";

    fn program(vertex: &str, fragment: &str) -> ProgramSource {
        ProgramSource {
            name: "test".to_string(),
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
            depth_sampling: None,
        }
    }

    fn compile_message(result: Result<(), ShaderError>) -> String {
        match result {
            Err(ShaderError::Compile { message, .. }) => message,
            other => panic!("expected a compile error, got {other:?}"),
        }
    }

    #[test]
    fn bundled_shadow_programs_validate() {
        let assets = AssetDir::new(DEFAULT_ASSET_DIR);
        for variant in [ShaderVariant::Full, ShaderVariant::Reduced] {
            let source = ProgramSource::shadow(&assets, variant).expect("bundled shaders load");
            if let Err(err) = validate_program(&source) {
                panic!("{} does not validate: {err}", variant.name());
            }
        }
    }

    #[test]
    fn stock_shader_validates() {
        validate_program(&program(STOCK_SHADER, STOCK_SHADER)).expect("stock shader is valid");
    }

    #[test]
    fn minimal_program_validates() {
        assert!(validate_program(&program(VERTEX, FRAGMENT)).is_ok());
    }

    #[test]
    fn entry_point_names_alone_do_not_compile() {
        let message = compile_message(validate_program(&program(
            "fn vs_main ((( not wgsl",
            "}}} fn fs_main @@@",
        )));
        assert!(message.starts_with("vertex stage"), "{message}");
    }

    #[test]
    fn type_errors_are_reported() {
        let fragment = "@fragment fn fs_main() -> @location(0) vec4<f32> {\n    return 1u;\n}\n";
        let message = compile_message(validate_program(&program(VERTEX, fragment)));
        assert!(message.starts_with("fragment stage"), "{message}");
    }

    #[test]
    fn entry_point_must_have_the_right_stage() {
        let fragment = FRAGMENT.replace("fs_main", "main");
        let message = compile_message(validate_program(&program(VERTEX, &fragment)));
        assert!(message.contains("fs_main"), "{message}");

        let message = compile_message(validate_program(&program(FRAGMENT, FRAGMENT)));
        assert!(message.contains("vs_main"), "{message}");
    }
}
