mod common;

use glam::Vec4;
use rstest::rstest;

use common::{
    assert_close, config, gradient, init_logger, solid, ScriptedUi, StubStage, GREY,
};
use pass::{
    stages::{FilmGrain, Glitch, Lut},
    Chain, ChainConfig, ChainError, DeviceError, Extent, FrameInputs, ImageDesc, NoUi,
    ParamOverride, PixelFormat, RenderDevice, SoftwareDevice, Stage,
};

#[rstest]
#[case::single(1)]
#[case::pair(2)]
#[case::triple(3)]
#[case::long(6)]
fn each_stage_reads_its_predecessor(#[case] len: usize) {
    init_logger();
    let mut device = SoftwareDevice::new();
    let stubs: Vec<_> = (0..len)
        .map(|i| StubStage::identity(&format!("stub{i}")))
        .collect();
    let seen: Vec<_> = stubs.iter().map(|stub| stub.seen.clone()).collect();
    let stages = stubs
        .into_iter()
        .map(|stub| Box::new(stub) as Box<dyn Stage>)
        .collect();

    let mut chain = Chain::new(stages).unwrap();
    chain.load(&mut device, &config(2, 2)).unwrap();
    let base = solid(&mut device, Extent::new(2, 2), GREY);

    for frame in 0..2 {
        let result = chain
            .render_frame(&mut device, &FrameInputs::new(frame as f32, base))
            .unwrap();
        assert_eq!(Some(result), chain.output());
        assert_eq!(Some(result), chain.stage(&format!("stub{}", len - 1)).unwrap().output());
    }

    for (i, seen) in seen.iter().enumerate() {
        let expected = match i {
            0 => base,
            _ => chain.stage(&format!("stub{}", i - 1)).unwrap().output().unwrap(),
        };
        assert_eq!(*seen.borrow(), [expected, expected]);
    }
}

#[rstest]
#[case::one(1)]
#[case::three(3)]
#[case::eight(8)]
fn identity_chain_preserves_constant_color(#[case] len: usize) {
    let mut device = SoftwareDevice::new();
    let color = Vec4::new(0.2, 0.4, 0.6, 1.);
    let stages = (0..len)
        .map(|i| Box::new(StubStage::identity(&format!("id{i}"))) as Box<dyn Stage>)
        .collect();

    let mut chain = Chain::new(stages).unwrap();
    chain.load(&mut device, &config(3, 2)).unwrap();
    let base = solid(&mut device, Extent::new(3, 2), color);
    let result = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap();

    assert_eq!(device.pixels(result).unwrap(), [color; 6]);
}

#[test]
fn failed_load_stops_at_the_failing_stage() {
    init_logger();
    let mut device = SoftwareDevice::new();
    let (a, b, c) = (
        StubStage::identity("a"),
        StubStage::missing("b"),
        StubStage::identity("c"),
    );
    let loads = [a.loads.clone(), b.loads.clone(), c.loads.clone()];

    let mut chain = Chain::new(vec![Box::new(a), Box::new(b), Box::new(c)]).unwrap();
    let err = chain.load(&mut device, &config(2, 2)).unwrap_err();

    assert!(matches!(
        &err,
        ChainError::Load { stage, source: DeviceError::EffectNotFound(shader) }
            if stage == "b" && shader == "test/missing"
    ));
    assert!(!err.is_recoverable());
    assert_eq!(loads.map(|count| count.get()), [1, 1, 0]);
    assert!(chain.stage("c").unwrap().output().is_none());
    assert!(chain.stage("a").unwrap().output().is_none());
    assert!(!chain.is_loaded());
    assert_eq!(device.live_images(), 0);
    assert_eq!(device.live_effects(), 0);

    let base = solid(&mut device, Extent::new(2, 2), GREY);
    assert!(matches!(
        chain.render_frame(&mut device, &FrameInputs::new(0., base)),
        Err(ChainError::NotLoaded)
    ));
}

#[test]
fn ui_without_edits_keeps_frames_identical() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::new(vec![
        Box::new(Lut::new().with_amount(0.5)),
        Box::new(FilmGrain::new().with_strength(30.)),
        Box::new(Glitch::new().with_strength(0.6)),
    ])
    .unwrap();
    chain.load(&mut device, &config(8, 8)).unwrap();
    let base = gradient(&mut device, Extent::new(8, 8));
    let inputs = FrameInputs::new(1.25, base);

    let first = chain.render_frame(&mut device, &inputs).unwrap();
    let before = device.pixels(first).unwrap().to_vec();
    let params: Vec<_> = chain.stages().map(|stage| stage.params().clone()).collect();

    let mut ui = ScriptedUi::default();
    assert!(!chain.render_ui(&mut ui));
    assert!(!chain.render_ui(&mut NoUi));
    assert_eq!(ui.panels, ["lut", "film_grain", "glitch"]);
    assert_eq!(ui.widgets, ["amount", "LUT texture", "strength", "strength"]);

    let after: Vec<_> = chain.stages().map(|stage| stage.params().clone()).collect();
    assert_eq!(params, after);
    let second = chain.render_frame(&mut device, &inputs).unwrap();
    assert_eq!(device.pixels(second).unwrap(), before);
}

#[test]
fn ui_edits_reach_only_their_stage() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();

    let mut ui = ScriptedUi::default().with_slider("strength", 42.);
    assert!(chain.render_ui(&mut ui));
    // The first "strength" slider drawn is film grain's.
    assert_eq!(chain.stage("film_grain").unwrap().params().get("strength"), Some(42.));
    assert_eq!(chain.stage("glitch").unwrap().params().get("strength"), Some(0.));
    assert_eq!(chain.stage("lut").unwrap().params().get("amount"), Some(0.));
    chain.unload(&mut device);
}

#[test]
fn grain_strength_does_not_touch_other_stages() {
    let mut device = SoftwareDevice::new();
    let config = ChainConfig::from_toml_str(
        r#"
        width = 4
        height = 4

        [[stage]]
        kind = "glitch"
        strength = 0.5

        [[stage]]
        kind = "lut"
        amount = 0.5

        [[stage]]
        kind = "film_grain"
        "#,
    )
    .unwrap();
    let mut chain = Chain::from_config(&config).unwrap();
    chain.load(&mut device, &config).unwrap();
    let base = gradient(&mut device, Extent::new(4, 4));
    let inputs = FrameInputs::new(0.5, base);

    let snapshot = |chain: &Chain, device: &SoftwareDevice, name: &str| {
        let output = chain.stage(name).unwrap().output().unwrap();
        device.pixels(output).unwrap().to_vec()
    };

    chain.render_frame(&mut device, &inputs).unwrap();
    let glitch = snapshot(&chain, &device, "glitch");
    let lut = snapshot(&chain, &device, "lut");
    let grain = snapshot(&chain, &device, "film_grain");

    let stage = chain.stage_mut("film_grain").unwrap();
    assert!(stage.params_mut().set("strength", 40.));
    chain.render_frame(&mut device, &inputs).unwrap();

    assert_eq!(snapshot(&chain, &device, "glitch"), glitch);
    assert_eq!(snapshot(&chain, &device, "lut"), lut);
    assert_ne!(snapshot(&chain, &device, "film_grain"), grain);
    assert_eq!(chain.stage("glitch").unwrap().params().get("strength"), Some(0.5));
    assert_eq!(chain.stage("lut").unwrap().params().get("amount"), Some(0.5));
}

#[test]
fn zeroed_default_chain_passes_grey_through() {
    init_logger();
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::new(Chain::default_stages()).unwrap();
    assert_eq!(chain.names().collect::<Vec<_>>(), ["lut", "film_grain", "glitch"]);

    chain.load(&mut device, &config(2, 2)).unwrap();
    let base = solid(&mut device, Extent::new(2, 2), GREY);
    let result = chain
        .render_frame(&mut device, &FrameInputs::new(3.7, base))
        .unwrap();

    assert_ne!(result, base);
    assert_close(device.pixels(result).unwrap(), &[GREY; 4], 1e-5);
}

#[rstest]
#[case::color(true)]
#[case::depth(false)]
fn mismatched_inputs_fall_back_to_base_color(#[case] color_mismatch: bool) {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();

    let small = solid(&mut device, Extent::new(2, 2), GREY);
    let large = solid(&mut device, Extent::new(4, 4), GREY);
    let mut inputs = FrameInputs::new(0., small);
    if color_mismatch {
        inputs.color = large;
    } else {
        inputs.depth = Some(large);
    }

    let err = chain.render_frame(&mut device, &inputs).unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(
        err,
        ChainError::ExtentMismatch { expected, actual, .. }
            if expected == Extent::new(2, 2) && actual == Extent::new(4, 4)
    ));

    let result = chain.render_or_passthrough(&mut device, &inputs).unwrap();
    assert_eq!(result, inputs.color);
}

#[test]
fn single_channel_color_is_rejected() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();
    let depth = device
        .create_image(&ImageDesc::render_target(
            "depth",
            Extent::new(2, 2),
            PixelFormat::R32Float,
        ))
        .unwrap();

    let err = chain
        .render_frame(&mut device, &FrameInputs::new(0., depth))
        .unwrap_err();
    assert!(matches!(err, ChainError::FormatMismatch { input: "color", .. }));
    assert!(err.is_recoverable());
}

#[test]
fn destroyed_input_is_reported() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();
    let base = solid(&mut device, Extent::new(2, 2), GREY);
    device.destroy_image(base);

    let err = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap_err();
    assert!(matches!(err, ChainError::MissingInput("color")));
}

#[test]
fn resize_reallocates_outputs() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();
    let live = device.live_images();

    chain.resize(&mut device, Extent::new(5, 3)).unwrap();
    assert_eq!(chain.extent(), Some(Extent::new(5, 3)));
    assert_eq!(device.live_images(), live);
    let output = chain.output().unwrap();
    assert_eq!(device.image_extent(output), Some(Extent::new(5, 3)));

    // Minimized windows report an empty extent.
    chain.resize(&mut device, Extent::new(0, 0)).unwrap();
    assert_eq!(chain.extent(), Some(Extent::new(5, 3)));

    let base = solid(&mut device, Extent::new(5, 3), GREY);
    let result = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap();
    assert_close(device.pixels(result).unwrap(), &[GREY; 15], 1e-5);

    let stale = solid(&mut device, Extent::new(2, 2), GREY);
    assert!(chain
        .render_frame(&mut device, &FrameInputs::new(0., stale))
        .is_err());
}

#[test]
fn failed_resize_restores_earlier_stages() {
    init_logger();
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::new(vec![
        Box::new(StubStage::identity("a")),
        Box::new(StubStage::identity("b").rejecting_width(8)),
        Box::new(StubStage::identity("c")),
    ])
    .unwrap();
    chain.load(&mut device, &config(4, 4)).unwrap();
    let live = device.live_images();

    let err = chain.resize(&mut device, Extent::new(8, 8)).unwrap_err();
    assert!(matches!(err, ChainError::Resize { ref stage, .. } if stage == "b"));
    assert_eq!(chain.extent(), Some(Extent::new(4, 4)));
    assert_eq!(device.live_images(), live);
    for name in ["a", "b", "c"] {
        let output = chain.stage(name).and_then(|stage| stage.output()).unwrap();
        assert_eq!(device.image_extent(output), Some(Extent::new(4, 4)), "{name}");
    }

    let base = solid(&mut device, Extent::new(4, 4), GREY);
    let result = chain
        .render_frame(&mut device, &FrameInputs::new(0., base))
        .unwrap();
    assert_close(device.pixels(result).unwrap(), &[GREY; 16], 1e-5);
}

#[test]
fn unrecoverable_resize_unloads_the_chain() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::new(vec![
        Box::new(StubStage::identity("a").rejecting_width(4)),
        Box::new(StubStage::identity("b").rejecting_width(8)),
    ])
    .unwrap();
    chain.load(&mut device, &config(4, 4)).unwrap();

    assert!(chain.resize(&mut device, Extent::new(8, 8)).is_err());
    assert!(!chain.is_loaded());
    assert_eq!(device.live_images(), 0);
    assert_eq!(device.live_effects(), 0);
}

#[test]
fn unload_releases_everything() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();
    assert!(chain.is_loaded());
    assert!(device.live_images() > 0);

    chain.unload(&mut device);
    assert!(!chain.is_loaded());
    assert_eq!(chain.output(), None);
    assert_eq!(device.live_images(), 0);
    assert_eq!(device.live_effects(), 0);

    // Loading again after an unload works from scratch.
    chain.load(&mut device, &config(2, 2)).unwrap();
    assert!(chain.output().is_some());
}

#[test]
fn reloading_releases_the_previous_resources() {
    let mut device = SoftwareDevice::new();
    let mut chain = Chain::default_chain();
    chain.load(&mut device, &config(2, 2)).unwrap();
    let live = (device.live_images(), device.live_effects());
    chain.load(&mut device, &config(4, 4)).unwrap();
    assert_eq!((device.live_images(), device.live_effects()), live);
    assert_eq!(chain.extent(), Some(Extent::new(4, 4)));
}

#[test]
fn rejects_empty_and_duplicate_chains() {
    assert!(matches!(Chain::new(vec![]), Err(ChainError::Empty)));
    let duplicate = Chain::new(vec![
        Box::new(Glitch::new()),
        Box::new(FilmGrain::named("glitch")),
    ]);
    assert!(matches!(duplicate, Err(ChainError::DuplicateStage(name)) if name == "glitch"));
}

#[test]
fn overrides_target_stage_parameters() {
    let mut chain = Chain::default_chain();
    let parsed: ParamOverride = "glitch.strength=0.75".parse().unwrap();
    chain.apply_override(&parsed).unwrap();
    assert_eq!(chain.stage("glitch").unwrap().params().get("strength"), Some(0.75));

    for bad in ["bloom.strength=1", "glitch.amount=1"] {
        let parsed: ParamOverride = bad.parse().unwrap();
        assert!(chain.apply_override(&parsed).is_err(), "{bad}");
    }
}

#[test]
fn out_of_range_values_are_not_clamped() {
    let mut chain = Chain::default_chain();
    let stage = chain.stage_mut("film_grain").unwrap();
    assert!(stage.params_mut().set("strength", 250.));
    assert_eq!(stage.params().get("strength"), Some(250.));
}
