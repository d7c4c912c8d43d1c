//! Parse and validate every WGSL module with naga, so shader errors show
//! up without a GPU.

use gridsort_gpu::shaders;

fn validate(name: &str, source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| format!("{name}: parse error\n{}", e.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| format!("{name}: validation error\n{e:?}"))?;
    Ok(module)
}

fn entry_points(module: &naga::Module) -> Vec<(&str, [u32; 3])> {
    module
        .entry_points
        .iter()
        .map(|ep| (ep.name.as_str(), ep.workgroup_size))
        .collect()
}

#[test]
fn test_all_shaders_validate() {
    let mut failures = Vec::new();
    for (name, source) in shaders::all_sources() {
        if let Err(e) = validate(name, &source) {
            failures.push(e);
        }
    }
    assert!(failures.is_empty(), "shader failures:\n{}", failures.join("\n\n"));
}

#[test]
fn test_scan_entry_points() {
    for kind in [shaders::ScanKind::Counters, shaders::ScanKind::Pairs] {
        let module = validate(kind.label(), &shaders::scan_source(kind)).unwrap();
        let found = entry_points(&module);
        assert!(found.iter().all(|&(_, size)| size == [256, 1, 1]));
        let names: Vec<&str> = found.iter().map(|&(name, _)| name).collect();
        assert_eq!(names, ["scan_blocks", "scan_block_sums", "add_block_sums"]);
    }
}

#[test]
fn test_one_element_kernels_use_workgroup_size() {
    for (name, source) in [
        ("clear", shaders::CLEAR),
        ("count_boids", shaders::COUNT_BOIDS),
        ("scatter_boids", shaders::SCATTER_BOIDS),
        ("mark_cells", shaders::MARK_CELLS),
    ] {
        let module = validate(name, source).unwrap();
        let expected = [("main", [gridsort_gpu::WORKGROUP_SIZE, 1, 1])];
        assert_eq!(entry_points(&module), expected, "{name}");
    }
    let module = validate("write_args", shaders::WRITE_ARGS).unwrap();
    assert_eq!(entry_points(&module), [("main", [1, 1, 1])]);
}
