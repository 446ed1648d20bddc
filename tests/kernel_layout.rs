//! Checks the WGSL shaders against the Rust-side binding table and uniform
//! layouts, without needing a GPU.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{ShaderStage, TypeInner};

use rainfall::binding::{ArgKind, SimParams, BINDING_TABLE, PARAMS_BINDING};
use rainfall::device::{KERNEL_ENTRY_POINT, RAIN_SIM_SOURCE};
use rainfall::render::{RenderUniforms, RAIN_RENDER_SOURCE};
use rainfall::stepper::WORKGROUP_SIZE;

fn parse(source: &str) -> naga::Module {
    let module = naga::front::wgsl::parse_str(source).expect("WGSL should parse");
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .expect("WGSL should validate");
    module
}

fn global<'m>(module: &'m naga::Module, name: &str) -> &'m naga::GlobalVariable {
    module
        .global_variables
        .iter()
        .map(|(_, var)| var)
        .find(|var| var.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("missing global `{name}`"))
}

fn struct_of(module: &naga::Module, var: &naga::GlobalVariable) -> (Vec<String>, u32) {
    match &module.types[var.ty].inner {
        TypeInner::Struct { members, span } => (
            members.iter().filter_map(|m| m.name.clone()).collect(),
            *span,
        ),
        other => panic!("expected a struct, got {other:?}"),
    }
}

#[test]
fn test_kernel_bindings_match_table() {
    let module = parse(RAIN_SIM_SOURCE);

    for arg in BINDING_TABLE.iter() {
        if let ArgKind::Scalar { .. } = arg.kind {
            continue;
        }
        let var = global(&module, arg.name);
        let binding = var.binding.as_ref().expect("resource binding");
        assert_eq!(binding.group, 0, "{}", arg.name);
        assert_eq!(binding.binding, arg.binding, "{}", arg.name);
    }

    let params = global(&module, "params");
    assert_eq!(params.binding.as_ref().map(|b| b.binding), Some(PARAMS_BINDING));
}

#[test]
fn test_kernel_params_layout() {
    let module = parse(RAIN_SIM_SOURCE);
    let (members, span) = struct_of(&module, global(&module, "params"));
    assert_eq!(members, ["eye", "delta_time", "particle_count", "cluster_scale"]);
    assert_eq!(span as usize, std::mem::size_of::<SimParams>());
}

#[test]
fn test_scalar_offsets_match_kernel() {
    let module = parse(RAIN_SIM_SOURCE);
    let params = global(&module, "params");
    let TypeInner::Struct { members, .. } = &module.types[params.ty].inner else {
        panic!("params is not a struct");
    };
    let offset_of = |name: &str| {
        members
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
            .map(|m| m.offset)
            .unwrap_or_else(|| panic!("no member `{name}`"))
    };

    for arg in BINDING_TABLE.iter() {
        let ArgKind::Scalar { offset } = arg.kind else { continue };
        let expected = match arg.name {
            "eye_x" => offset_of("eye"),
            "eye_y" => offset_of("eye") + 4,
            "eye_z" => offset_of("eye") + 8,
            name => offset_of(name),
        };
        assert_eq!(offset, expected, "{}", arg.name);
    }
}

#[test]
fn test_kernel_entry_point() {
    let module = parse(RAIN_SIM_SOURCE);
    let entry = module
        .entry_points
        .iter()
        .find(|e| e.name == KERNEL_ENTRY_POINT)
        .expect("kernel entry point");
    assert_eq!(entry.stage, ShaderStage::Compute);
    assert_eq!(entry.workgroup_size, [WORKGROUP_SIZE, 1, 1]);
}

#[test]
fn test_render_uniforms_layout() {
    let module = parse(RAIN_RENDER_SOURCE);
    let (members, span) = struct_of(&module, global(&module, "uniforms"));
    assert_eq!(members, ["viewProj", "eyeposition"]);
    assert_eq!(span as usize, std::mem::size_of::<RenderUniforms>());

    let stages: Vec<_> = module.entry_points.iter().map(|e| (e.name.as_str(), e.stage)).collect();
    assert!(stages.contains(&("vs_main", ShaderStage::Vertex)));
    assert!(stages.contains(&("fs_main", ShaderStage::Fragment)));
}
