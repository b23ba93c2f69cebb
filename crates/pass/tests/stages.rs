mod common;

use std::path::PathBuf;

use glam::{Vec3, Vec4};
use rstest::rstest;

use common::{assert_close, config, gradient, solid, ScriptedUi, GREY};
use pass::{
    stages::{identity_table, FilmGrain, Fxaa, Glitch, Lut},
    Chain, ChainError, DeviceError, Extent, FrameInputs, ImageDesc, PixelFormat, RenderDevice,
    SoftwareDevice, Stage,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("postfx-{}-{name}", std::process::id()))
}

/// Writes an `N*N x N` strip to a PNG without keeping the image alive.
fn save_strip(device: &mut SoftwareDevice, texels: &[Vec4], size: u32, name: &str) -> PathBuf {
    let desc = ImageDesc::texture(
        "strip",
        Extent::new(size * size, size),
        PixelFormat::Rgba8Unorm,
    );
    let strip = device.create_image_with_data(&desc, texels).unwrap();
    let path = temp_path(name);
    device.save_image(strip, &path).unwrap();
    device.destroy_image(strip);
    path
}

/// Maps every color to its complement.
fn inverted_table(size: u32) -> Vec<Vec4> {
    identity_table(size)
        .into_iter()
        .map(|texel| (Vec3::ONE - texel.truncate()).extend(1.))
        .collect()
}

fn render_single(
    stage: impl Stage + 'static,
    device: &mut SoftwareDevice,
    base: pass::ImageHandle,
    extent: Extent,
) -> Vec<Vec4> {
    let mut chain = Chain::new(vec![Box::new(stage)]).unwrap();
    chain
        .load(device, &config(extent.width, extent.height))
        .unwrap();
    let result = chain
        .render_frame(device, &FrameInputs::new(0.75, base))
        .unwrap();
    let pixels = device.pixels(result).unwrap().to_vec();
    chain.unload(device);
    pixels
}

#[test]
fn identity_lut_at_full_amount_keeps_colors() {
    let mut device = SoftwareDevice::new();
    let extent = Extent::new(6, 5);
    let base = gradient(&mut device, extent);
    let expected = device.pixels(base).unwrap().to_vec();

    let graded = render_single(Lut::new().with_amount(1.), &mut device, base, extent);
    assert_close(&graded, &expected, 1e-3);
}

#[test]
fn lut_loaded_from_file_grades_like_the_generated_one() {
    let mut device = SoftwareDevice::new();
    let size = 8;
    let strip = device
        .create_image_with_data(
            &ImageDesc::texture(
                "strip",
                Extent::new(size * size, size),
                PixelFormat::Rgba8Unorm,
            ),
            &identity_table(size),
        )
        .unwrap();
    let path = temp_path("identity-lut.png");
    device.save_image(strip, &path).unwrap();

    let extent = Extent::new(4, 4);
    let base = gradient(&mut device, extent);
    let expected = device.pixels(base).unwrap().to_vec();
    let lut = Lut::new().with_amount(1.).with_table(&path);
    assert_eq!(lut.table_source(), Some(path.as_path()));

    let graded = render_single(lut, &mut device, base, extent);
    assert_close(&graded, &expected, 1e-2);
    let _ = std::fs::remove_file(path);
}

#[rstest]
#[case::full(1., "inverted-full.png")]
#[case::half(0.5, "inverted-half.png")]
#[case::quarter(0.25, "inverted-quarter.png")]
fn lut_amount_blends_towards_the_table(#[case] amount: f32, #[case] file: &str) {
    let mut device = SoftwareDevice::new();
    let path = save_strip(&mut device, &inverted_table(8), 8, file);

    let extent = Extent::new(6, 5);
    let base = gradient(&mut device, extent);
    let expected: Vec<_> = device
        .pixels(base)
        .unwrap()
        .iter()
        .map(|color| {
            let rgb = color.truncate();
            rgb.lerp(Vec3::ONE - rgb, amount).extend(color.w)
        })
        .collect();

    let lut = Lut::new().with_amount(amount).with_table(&path);
    let graded = render_single(lut, &mut device, base, extent);
    assert_close(&graded, &expected, 1e-2);
    let _ = std::fs::remove_file(path);
}

#[test]
fn lut_swapped_from_the_panel_grades_the_next_frame() {
    let mut device = SoftwareDevice::new();
    let path = save_strip(&mut device, &inverted_table(8), 8, "swap-inverted.png");
    let extent = Extent::new(4, 4);
    let base = gradient(&mut device, extent);
    let colors = device.pixels(base).unwrap().to_vec();

    let mut chain = Chain::new(vec![Box::new(Lut::new().with_amount(1.))]).unwrap();
    chain.load(&mut device, &config(4, 4)).unwrap();
    let before = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap();
    assert_close(device.pixels(before).unwrap(), &colors, 1e-2);
    let live = device.live_images();

    let mut ui = ScriptedUi::default().with_file("LUT texture", &path.display().to_string());
    assert!(chain.render_ui(&mut ui));
    let after = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap();
    let inverted: Vec<_> = colors
        .iter()
        .map(|color| (Vec3::ONE - color.truncate()).extend(color.w))
        .collect();
    assert_close(device.pixels(after).unwrap(), &inverted, 1e-2);
    // The identity table was released when the new one was bound.
    assert_eq!(device.live_images(), live);
    let _ = std::fs::remove_file(path);
}

#[test]
fn malformed_lut_fails_to_load() {
    let mut device = SoftwareDevice::new();
    let square = device
        .create_image_with_data(
            &ImageDesc::texture("square", Extent::new(3, 3), PixelFormat::Rgba8Unorm),
            &[Vec4::ONE; 9],
        )
        .unwrap();
    let path = temp_path("square-lut.png");
    device.save_image(square, &path).unwrap();
    device.destroy_image(square);

    let mut chain = Chain::new(vec![Box::new(Lut::new().with_table(&path))]).unwrap();
    let err = chain.load(&mut device, &config(2, 2)).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Load {
            source: DeviceError::InvalidImage(_),
            ..
        }
    ));
    assert_eq!(device.live_images(), 0);
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_lut_file_fails_to_load() {
    let mut device = SoftwareDevice::new();
    let mut chain =
        Chain::new(vec![Box::new(Lut::new().with_table(temp_path("nope.png")))]).unwrap();
    let err = chain.load(&mut device, &config(2, 2)).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Load {
            source: DeviceError::ImageLoad { .. },
            ..
        }
    ));
}

#[test]
fn failed_lut_reload_keeps_the_current_table() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::new(vec![Box::new(Lut::new().with_amount(1.))]).unwrap();
    chain.load(&mut device, &config(2, 2)).unwrap();
    let base = solid(&mut device, Extent::new(2, 2), GREY);
    let live = device.live_images();

    let mut ui = ScriptedUi::default().with_file("LUT texture", "/does/not/exist.png");
    assert!(chain.render_ui(&mut ui));

    let result = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap();
    assert_close(device.pixels(result).unwrap(), &[GREY; 4], 1e-3);
    assert_eq!(device.live_images(), live);
}

#[rstest]
#[case::grain(Box::new(FilmGrain::new().with_strength(50.)))]
#[case::glitch(Box::new(Glitch::new().with_strength(1.)))]
fn nonzero_strength_changes_the_image(#[case] stage: Box<dyn Stage>) {
    let mut device = SoftwareDevice::new();
    let extent = Extent::new(16, 16);
    let base = gradient(&mut device, extent);
    let original = device.pixels(base).unwrap().to_vec();

    let mut chain = Chain::new(vec![stage]).unwrap();
    chain.load(&mut device, &config(16, 16)).unwrap();
    let result = chain
        .render_frame(&mut device, &FrameInputs::new(2.5, base))
        .unwrap();
    assert_ne!(device.pixels(result).unwrap(), original.as_slice());
}

#[test]
fn grain_varies_with_time() {
    let mut device = SoftwareDevice::new();
    let base = solid(&mut device, Extent::new(8, 8), GREY);
    let mut chain = Chain::new(vec![Box::new(FilmGrain::new().with_strength(20.))]).unwrap();
    chain.load(&mut device, &config(8, 8)).unwrap();

    let first = chain
        .render_frame(&mut device, &FrameInputs::new(0.1, base))
        .unwrap();
    let first = device.pixels(first).unwrap().to_vec();
    let second = chain
        .render_frame(&mut device, &FrameInputs::new(0.6, base))
        .unwrap();
    assert_ne!(device.pixels(second).unwrap(), first.as_slice());
    for texel in first {
        assert!((texel.x - 0.5).abs() <= 0.1 + 1e-6);
        assert_eq!(texel.w, 1.);
    }
}

#[rstest]
#[case::enabled(true)]
#[case::disabled(false)]
fn fxaa_keeps_flat_images_flat(#[case] enabled: bool) {
    let mut device = SoftwareDevice::new();
    let color = Vec4::new(0.3, 0.6, 0.9, 1.);
    let extent = Extent::new(4, 3);
    let base = solid(&mut device, extent, color);

    let output = render_single(Fxaa::new().with_enabled(enabled), &mut device, base, extent);
    assert_close(&output, &[color; 12], 1e-5);
}

#[test]
fn disabled_fxaa_copies_exactly() {
    let mut device = SoftwareDevice::new();
    let extent = Extent::new(5, 5);
    let base = gradient(&mut device, extent);
    let expected = device.pixels(base).unwrap().to_vec();

    let output = render_single(Fxaa::new().with_enabled(false), &mut device, base, extent);
    assert_eq!(output, expected);
}

#[test]
fn fxaa_softens_hard_edges() {
    let mut device = SoftwareDevice::new();
    let extent = Extent::new(8, 8);
    let texels: Vec<_> = (0..64)
        .map(|i| {
            let (x, y) = (i % 8, i / 8);
            if x > y {
                Vec4::ONE
            } else {
                Vec4::new(0., 0., 0., 1.)
            }
        })
        .collect();
    let base = device
        .create_image_with_data(
            &ImageDesc::texture("edge", extent, PixelFormat::Rgba16Float),
            &texels,
        )
        .unwrap();

    let output = render_single(Fxaa::new(), &mut device, base, extent);
    assert!(output
        .iter()
        .any(|texel| texel.x > 0.05 && texel.x < 0.95));
}

#[test]
fn fxaa_panel_has_a_toggle() {
    let mut fxaa = Fxaa::new();
    let mut ui = ScriptedUi::default();
    assert!(!fxaa.ui(&mut ui));
    assert_eq!(ui.panels, ["fxaa"]);
    assert_eq!(ui.widgets, ["rcp_x", "rcp_y", "FXAA"]);
}
