use std::{
    io::Cursor,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use nowcast::{
    Canvas, ComparisonMode, ComparisonParams, Engine, EngineConfig, Frame, NowcastError,
    PlaybackTimer, RasterBuffer, composite,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "nowcast_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn gradient_png(w: u32, h: u32, shift: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(w, h, |x, y| {
        let v = (((x + shift) * 255) / w.max(1)).min(255) as u8;
        image::Rgba([v, (y * 255 / h.max(1)) as u8, 255 - v, 255])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn small_config() -> EngineConfig {
    EngineConfig {
        canvas: Canvas::new(40, 30).unwrap(),
        horizon: 5,
        ..Default::default()
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn load_predict_render_and_measure() {
    let dir = temp_dir("engine_flow");
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..3 {
        std::fs::write(dir.join(format!("t{i:02}.png")), gradient_png(32, 24, i)).unwrap();
    }
    std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

    let mut engine = Engine::new(small_config()).unwrap();
    let paths = nowcast::ingest::list_images(&dir).unwrap();
    assert_eq!(engine.load_inputs(&paths).unwrap(), 3);
    assert_eq!(engine.status(), "3 input frame(s) loaded");
    assert_eq!(
        engine.left_frame().unwrap().bytes(),
        std::fs::read(dir.join("t02.png")).unwrap().as_slice()
    );

    assert_eq!(engine.run_prediction().unwrap(), 5);
    assert_eq!(engine.status(), "Got 5 predicted frame(s)");

    for mode in [ComparisonMode::Side, ComparisonMode::Overlay, ComparisonMode::Diff] {
        engine.set_compare_mode(mode);
        let (left, right) = engine.render().unwrap();
        assert_eq!((left.width, left.height), (40, 30));
        assert_eq!((right.width, right.height), (40, 30));
        assert!(right.data.iter().any(|&b| b != 0), "{mode:?} rendered nothing");
    }

    let m = engine.metrics().unwrap().unwrap();
    assert!(m.score > 0.5, "shifted prediction should still correlate: {}", m.score);
    assert!(m.mse > 0.0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn mock_prediction_with_no_inputs_is_empty_input() {
    let mut engine = Engine::new(small_config()).unwrap();
    let err = engine.run_prediction().unwrap_err();
    assert!(matches!(err, NowcastError::EmptyInput));
    assert_eq!(engine.status(), "Please load input frames first");
}

#[test]
fn identical_frames_diff_to_zero_heat() {
    let frame = Frame::from_bytes(gradient_png(16, 16, 0));
    let mut target = RasterBuffer::new(Canvas::new(20, 20).unwrap());
    let params = ComparisonParams {
        opacity: 0.6,
        diff_threshold: 0.0,
    };
    composite(
        &mut target,
        Some(&frame),
        Some(&frame),
        ComparisonMode::Diff,
        params,
        TIMEOUT,
    )
    .unwrap();
    assert!(target.data.chunks_exact(4).all(|px| px == [0, 0, 255, 255]));
}

#[test]
fn diff_needs_both_frames() {
    let frame = Frame::from_bytes(gradient_png(8, 8, 0));
    let mut target = RasterBuffer::new(Canvas::new(8, 8).unwrap());
    target.fill([1, 2, 3, 255]);
    composite(
        &mut target,
        Some(&frame),
        None,
        ComparisonMode::Diff,
        ComparisonParams::default(),
        TIMEOUT,
    )
    .unwrap();
    assert!(target.data.iter().all(|&b| b == 0));
}

#[test]
fn side_mode_ignores_left() {
    let left = Frame::from_bytes(gradient_png(8, 8, 0));
    let right = Frame::from_bytes(gradient_png(8, 8, 4));
    let mut with_left = RasterBuffer::new(Canvas::new(8, 8).unwrap());
    let mut without_left = RasterBuffer::new(Canvas::new(8, 8).unwrap());
    let params = ComparisonParams::default();
    composite(
        &mut with_left,
        Some(&left),
        Some(&right),
        ComparisonMode::Side,
        params,
        TIMEOUT,
    )
    .unwrap();
    composite(
        &mut without_left,
        None,
        Some(&right),
        ComparisonMode::Side,
        params,
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(with_left, without_left);
}

#[test]
fn overlay_at_zero_opacity_shows_left_only() {
    let left = Frame::from_bytes(gradient_png(8, 8, 0));
    let right = Frame::from_bytes(gradient_png(8, 8, 4));
    let mut overlay = RasterBuffer::new(Canvas::new(8, 8).unwrap());
    let mut plain = RasterBuffer::new(Canvas::new(8, 8).unwrap());
    let params = ComparisonParams {
        opacity: 0.0,
        diff_threshold: 0.0,
    };
    composite(
        &mut overlay,
        Some(&left),
        Some(&right),
        ComparisonMode::Overlay,
        params,
        TIMEOUT,
    )
    .unwrap();
    composite(
        &mut plain,
        None,
        Some(&left),
        ComparisonMode::Side,
        params,
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(overlay, plain);
}

#[test]
fn composite_is_idempotent() {
    let left = Frame::from_bytes(gradient_png(12, 9, 0));
    let right = Frame::from_bytes(gradient_png(12, 9, 3));
    let mut target = RasterBuffer::new(Canvas::new(16, 16).unwrap());
    let params = ComparisonParams::default();
    composite(
        &mut target,
        Some(&left),
        Some(&right),
        ComparisonMode::Overlay,
        params,
        TIMEOUT,
    )
    .unwrap();
    let first = target.clone();
    composite(
        &mut target,
        Some(&left),
        Some(&right),
        ComparisonMode::Overlay,
        params,
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(target, first);
}

#[test]
fn undecodable_frame_fails_render_and_keeps_last_raster() {
    let mut engine = Engine::new(small_config()).unwrap();
    engine.set_inputs(vec![Frame::from_bytes(gradient_png(8, 8, 0))]);
    engine.render().unwrap();
    let before = engine.left_raster().clone();

    engine.set_inputs(vec![Frame::from_bytes(b"garbage".to_vec())]);
    let err = engine.render().unwrap_err();
    assert!(matches!(err, NowcastError::Decode(_)));
    assert_eq!(engine.left_raster(), &before);
    assert!(engine.needs_render());
}

#[test]
fn decode_timeout_fails_render_and_keeps_last_raster() {
    let mut engine = Engine::new(small_config()).unwrap();
    engine.set_inputs(vec![Frame::from_bytes(gradient_png(8, 8, 0))]);
    engine.render().unwrap();
    let before_left = engine.left_raster().clone();
    let before_right = engine.right_raster().clone();

    engine.set_decode_timeout_ms(1).unwrap();
    engine.set_inputs(vec![Frame::from_bytes(gradient_png(2048, 2048, 0))]);
    let err = engine.render().unwrap_err();
    assert!(matches!(err, NowcastError::DecodeTimeout { millis: 1 }));
    assert_eq!(engine.left_raster(), &before_left);
    assert_eq!(engine.right_raster(), &before_right);
    assert!(engine.needs_render());
    assert!(engine.set_decode_timeout_ms(0).is_err());
}

#[test]
fn playback_wraps_over_predictions() {
    let mut engine = Engine::new(small_config()).unwrap();
    engine.set_inputs(vec![Frame::from_bytes(gradient_png(8, 8, 0))]);
    engine.run_prediction().unwrap();

    let t0 = std::time::Instant::now();
    engine.play(t0);
    let interval = engine.config().tick_interval();
    let mut cursors = Vec::new();
    for i in 1..=5u32 {
        cursors.push(engine.tick(t0 + interval * i).unwrap());
    }
    assert_eq!(cursors, [1usize, 2, 3, 4, 0]);

    engine.pause();
    assert_eq!(engine.tick(t0 + interval * 10), None);
}

#[test]
fn paused_engine_ignores_a_running_timer() {
    let config = EngineConfig {
        tick_interval_ms: 5,
        ..small_config()
    };
    let mut engine = Engine::new(config).unwrap();
    engine.set_inputs(vec![Frame::from_bytes(gradient_png(8, 8, 0))]);
    engine.run_prediction().unwrap();
    engine.play(std::time::Instant::now());

    let engine = Arc::new(Mutex::new(engine));
    let advances = Arc::new(AtomicUsize::new(0));
    let (shared, counter) = (Arc::clone(&engine), Arc::clone(&advances));
    let mut timer = PlaybackTimer::spawn(Duration::from_millis(1), move |now| {
        let mut engine = shared.lock().unwrap();
        if engine.tick(now).is_some() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    })
    .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while advances.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(advances.load(Ordering::SeqCst) > 0);

    engine.lock().unwrap().pause();
    let paused_at = advances.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert!(timer.is_running());
    assert_eq!(advances.load(Ordering::SeqCst), paused_at);

    timer.stop();
    assert!(!timer.is_running());
}
