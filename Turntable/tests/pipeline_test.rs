use pretty_assertions::assert_eq;
use turntable::prelude::*;

/// A 2x2x2 cube centered at (5, 5, 5).
const OFFSET_CUBE_OBJ: &str = "\
o cube
v 4 4 4
v 6 4 4
v 6 6 4
v 4 6 4
v 4 4 6
v 6 4 6
v 6 6 6
v 4 6 6
f 1 4 3 2
f 5 6 7 8
f 1 2 6 5
f 4 8 7 3
f 1 5 8 4
f 2 3 7 6
";

/// A one-triangle glTF with a side buffer and a base color texture.
const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "mesh": 0 }],
  "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
  "materials": [{ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
  "textures": [{ "source": 0 }],
  "images": [{ "uri": "textures/wood.png" }],
  "buffers": [{ "uri": "triangle.bin", "byteLength": 36 }],
  "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
  "accessors": [{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0, 0, 0], "max": [1, 1, 0]
  }]
}"#;

fn triangle_bin() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

fn cube_selection() -> FileSelection {
    FileSelection::new(vec![SelectedFile::new(
        "cube.obj",
        OFFSET_CUBE_OBJ.as_bytes().to_vec(),
    )])
    .unwrap()
}

#[test]
fn test_offset_cube_generates_closed_loop() {
    let mut pipeline = Pipeline::default();
    pipeline.load(&cube_selection()).unwrap();

    let bbox = pipeline.preview().model().unwrap().bounding_volume();
    assert!(bbox.center().length() < 1e-4);
    assert!((bbox.max_dim() - 4.0).abs() < 1e-4);

    let options = GenerationOptions {
        frame_count: 4,
        image_size: 100,
        background: "#000000".parse().unwrap(),
        ..GenerationOptions::default()
    };
    let mut updates = Vec::new();
    let output = pipeline
        .generate(&options, &mut |progress| {
            updates.push((progress.phase, progress.percent));
        })
        .unwrap();

    assert_eq!(output.frames.len(), 5);
    assert!(output.frames.is_closed());
    assert_eq!(output.frames.frames()[0], output.frames.frames()[4]);
    let first = output.frames.frames()[0].decode().unwrap();
    assert_eq!(first.dimensions(), (100, 100));

    assert_eq!(output.blob.mime_type, "image/gif");
    assert!(output.blob.bytes.starts_with(b"GIF89a"));
    let mut decoder = gif::DecodeOptions::new()
        .read_info(output.blob.bytes.as_slice())
        .unwrap();
    assert_eq!((decoder.width(), decoder.height()), (100, 100));
    let mut gif_frames = 0;
    while decoder.read_next_frame().unwrap().is_some() {
        gif_frames += 1;
    }
    assert_eq!(gif_frames, 5);

    let rendering: Vec<u32> = updates
        .iter()
        .filter(|(phase, _)| *phase == GenerationPhase::Rendering)
        .map(|(_, p)| *p)
        .collect();
    assert_eq!(rendering, vec![0, 13, 25, 38]);
    let encoding: Vec<u32> = updates
        .iter()
        .filter(|(phase, _)| *phase == GenerationPhase::Encoding)
        .map(|(_, p)| *p)
        .collect();
    assert_eq!(encoding.first(), Some(&50));
    assert_eq!(encoding.last(), Some(&100));
    assert!(updates.windows(2).all(|w| w[0].1 <= w[1].1));

    assert_eq!(pipeline.state(), &PipelineState::Done);
}

#[test]
fn test_generate_before_load_is_rejected() {
    let mut pipeline = Pipeline::default();
    let mut called = false;
    let err = pipeline
        .generate(&GenerationOptions::default(), &mut |_| called = true)
        .unwrap_err();
    assert!(matches!(err, Error::NoModelLoaded));
    assert!(!called);
    assert!(!pipeline.preview().has_model());
}

#[test]
fn test_missing_bin_is_critical() {
    let selection = FileSelection::new(vec![SelectedFile::new(
        "triangle.gltf",
        TRIANGLE_GLTF.as_bytes().to_vec(),
    )])
    .unwrap();

    let mut pipeline = Pipeline::default();
    let err = pipeline.load(&selection).unwrap_err();
    assert!(matches!(err, Error::CriticalResourceMissing { ref name } if name == "triangle.bin"));
    assert!(!pipeline.preview().has_model());
}

#[test]
fn test_missing_texture_is_a_warning() {
    let selection = FileSelection::new(vec![
        SelectedFile::new("triangle.gltf", TRIANGLE_GLTF.as_bytes().to_vec()),
        SelectedFile::new("triangle.bin", triangle_bin()),
    ])
    .unwrap();

    let report = load_model(&selection).unwrap();
    assert_eq!(report.format, ModelFormat::Gltf);
    assert_eq!(report.inventory.triangles, 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].name, "wood.png");
    assert!(report.model.materials[0].texture.is_none());

    let mut pipeline = Pipeline::default();
    pipeline.load(&selection).unwrap();
    assert_eq!(pipeline.preview().warnings().len(), 1);
}

#[test]
fn test_unsupported_extension() {
    let selection =
        FileSelection::new(vec![SelectedFile::new("scene.fbx", b"FBX".to_vec())]).unwrap();
    let err = load_model(&selection).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "fbx"));
}

#[cfg(feature = "cli")]
#[test]
fn test_cli_writes_gif_and_preview() {
    use clap::Parser;
    use std::ffi::OsString;
    use turntable::cli::{Cli, generate};

    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("cube.obj");
    std::fs::write(&model, OFFSET_CUBE_OBJ).unwrap();
    let output = dir.path().join("cube.gif");
    let preview = dir.path().join("cube.png");

    let args: Vec<OsString> = vec![
        "turntable".into(),
        "--model".into(),
        model.into_os_string(),
        "--output".into(),
        output.clone().into_os_string(),
        "--preview".into(),
        preview.clone().into_os_string(),
        "--frames=3".into(),
        "--size=32".into(),
        "--bg=#000000".into(),
        "--quiet".into(),
    ];
    let cli = Cli::try_parse_from(args).unwrap();
    generate::execute(&cli).unwrap();

    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"GIF89a"));
    let png = image::open(&preview).unwrap();
    assert_eq!((png.width(), png.height()), (32, 32));
}
