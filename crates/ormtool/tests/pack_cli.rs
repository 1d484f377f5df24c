use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{GrayImage, Luma};
use tempfile::TempDir;

fn write_gray(path: &Path, width: u32, height: u32, value: u8) {
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .unwrap();
}

/// White AO, mid-gray roughness, black metallic.
fn reference_maps(root: &Path) {
    write_gray(&root.join("ao.png"), 4, 4, 255);
    write_gray(&root.join("rough.png"), 4, 4, 128);
    write_gray(&root.join("metal.png"), 4, 4, 0);
}

fn ormtool(root: &Path, args: &[&str]) -> Output {
    ormtool_with_log(root, args, "warn")
}

fn ormtool_with_log(root: &Path, args: &[&str], filter: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ormtool"))
        .current_dir(root)
        .env("ORMTOOL_CONFIG_DIR", root.join("config"))
        .env_remove("ORMTOOL_CONFIG")
        .env("RUST_LOG", filter)
        .args(args)
        .output()
        .expect("failed to run ormtool")
}

const MAPS: [&str; 6] = [
    "--ao",
    "ao.png",
    "--roughness",
    "rough.png",
    "--metallic",
    "metal.png",
];

#[test]
fn pack_writes_both_layouts() {
    let root = TempDir::new().unwrap();
    reference_maps(root.path());

    let output = ormtool(root.path(), &[&["pack", "--quiet"][..], &MAPS[..]].concat());
    assert!(output.status.success(), "{output:?}");

    let unreal = image::open(root.path().join("orm_unreal.png")).unwrap();
    assert_eq!(unreal.color(), image::ColorType::Rgb8);
    let unreal = unreal.to_rgb8();
    assert_eq!(unreal.dimensions(), (4, 4));
    assert!(unreal.pixels().all(|p| p.0 == [255, 128, 0]));

    let unity = image::open(root.path().join("orm_unity.png")).unwrap();
    assert_eq!(unity.color(), image::ColorType::Rgba8);
    assert!(unity.to_rgba8().pixels().all(|p| p.0 == [0, 255, 255, 127]));
}

#[test]
fn json_report_lists_outputs_and_previews() {
    let root = TempDir::new().unwrap();
    reference_maps(root.path());

    let output = ormtool(
        root.path(),
        &[
            &["pack", "--json", "--unreal-out", "T_ORM.tga", "--no-unity"][..],
            &MAPS[..],
        ]
        .concat(),
    );
    assert!(output.status.success(), "{output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["width"], 4);
    assert_eq!(report["height"], 4);
    let outputs = report["outputs"].as_array().unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0]["layout"], "unreal");
    assert_eq!(outputs[0]["path"], "T_ORM.tga");
    assert_eq!(report["previews"].as_array().unwrap().len(), 4);

    assert!(root.path().join("T_ORM.tga").exists());
    assert!(!root.path().join("orm_unity.png").exists());
}

#[test]
fn verbose_logging_stays_off_stdout() {
    let root = TempDir::new().unwrap();
    reference_maps(root.path());

    let output = ormtool_with_log(
        root.path(),
        &[&["pack", "--json"][..], &MAPS[..]].concat(),
        "debug",
    );
    assert!(output.status.success(), "{output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outputs"].as_array().unwrap().len(), 2);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("packing started"), "{stderr}");
}

#[test]
fn dimension_mismatch_fails_without_writing() {
    let root = TempDir::new().unwrap();
    write_gray(&root.path().join("ao.png"), 4, 4, 255);
    write_gray(&root.path().join("rough.png"), 4, 4, 128);
    write_gray(&root.path().join("metal.png"), 8, 8, 0);

    let output = ormtool(root.path(), &[&["pack", "--quiet"][..], &MAPS[..]].concat());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dimension"), "{stderr}");
    assert!(!root.path().join("orm_unreal.png").exists());
    assert!(!root.path().join("orm_unity.png").exists());
}

#[test]
fn missing_source_fails() {
    let root = TempDir::new().unwrap();
    write_gray(&root.path().join("ao.png"), 4, 4, 255);
    write_gray(&root.path().join("rough.png"), 4, 4, 128);

    let output = ormtool(root.path(), &[&["pack", "--quiet"][..], &MAPS[..]].concat());
    assert!(!output.status.success());
    assert!(!root.path().join("orm_unreal.png").exists());
}

#[test]
fn no_targets_succeeds_without_output() {
    let root = TempDir::new().unwrap();
    reference_maps(root.path());

    let output = ormtool(
        root.path(),
        &[&["pack", "--quiet", "--no-unreal", "--no-unity"][..], &MAPS[..]].concat(),
    );
    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("No textures written"));
    assert!(!root.path().join("orm_unreal.png").exists());
    assert!(!root.path().join("orm_unity.png").exists());
}

#[test]
fn config_file_selects_outputs() {
    let root = TempDir::new().unwrap();
    reference_maps(root.path());
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("ormtool.toml"),
        r#"
[outputs]
unity = "packed/T_MetallicSmoothness.png"

[targets]
unreal = false
"#,
    )
    .unwrap();
    fs::create_dir_all(root.path().join("packed")).unwrap();

    let output = ormtool(root.path(), &[&["pack", "--quiet"][..], &MAPS[..]].concat());
    assert!(output.status.success(), "{output:?}");
    assert!(root.path().join("packed/T_MetallicSmoothness.png").exists());
    assert!(!root.path().join("orm_unreal.png").exists());
}

#[test]
fn invalid_config_is_reported() {
    let root = TempDir::new().unwrap();
    reference_maps(root.path());
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("ormtool.toml"), "version = 9\n").unwrap();

    let output = ormtool(root.path(), &[&["pack", "--quiet"][..], &MAPS[..]].concat());
    assert!(!output.status.success());
    assert!(!root.path().join("orm_unreal.png").exists());
}

#[test]
fn channels_exports_grayscale_views() {
    let root = TempDir::new().unwrap();
    image::RgbImage::from_pixel(3, 2, image::Rgb([200, 100, 50]))
        .save(root.path().join("orm.png"))
        .unwrap();

    let output = ormtool(root.path(), &["channels", "orm.png", "--out-dir", "views"]);
    assert!(output.status.success(), "{output:?}");

    for (suffix, expected) in [("r", 200u8), ("g", 100), ("b", 50)] {
        let plane = image::open(root.path().join(format!("views/orm_{suffix}.png")))
            .unwrap()
            .to_luma8();
        assert_eq!(plane.dimensions(), (3, 2));
        assert!(plane.pixels().all(|p| p.0[0] == expected));
    }
}

#[test]
fn where_prints_effective_configuration() {
    let root = TempDir::new().unwrap();
    let output = ormtool(root.path(), &["where"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ormtool.toml"));
    assert!(stdout.contains("not present"));
    assert!(stdout.contains("orm_unreal.png"));
}
