//! Integration tests for the framegrade pipeline

use framegrade::{
    Extent, Frame, FramePipeline, LookupTable, MemorySurface, PipelineConfig, PixelFormat,
    Producer, SyntheticSource, TickOutcome,
};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;

/// Helper to write a .cube file that swaps red and blue
fn write_swap_cube(dir: &TempDir) -> std::path::PathBuf {
    let mut cube = String::from("# swap red/blue\nLUT_3D_SIZE 2\n");
    for b in 0..2 {
        for g in 0..2 {
            for r in 0..2 {
                cube.push_str(&format!("{}.0 {}.0 {}.0\n", b, g, r));
            }
        }
    }
    let path = dir.path().join("swap.cube");
    fs::write(&path, cube).unwrap();
    path
}

fn config(capacity: usize) -> PipelineConfig {
    PipelineConfig {
        admission_capacity: capacity,
        render_fps: 100,
        source_width: 32,
        source_height: 18,
        surface_width: 16,
        surface_height: 16,
        ..Default::default()
    }
}

fn red_frame(seq: u64) -> Frame {
    // BGRA pure red
    Frame::new([0u8, 0, 255, 255].repeat(4 * 4), 4, 4, PixelFormat::Bgra8, Duration::ZERO, seq).unwrap()
}

#[test]
fn test_cube_scenario_size_two() {
    let mut cube = String::from("LUT_3D_SIZE 2\n");
    let triples = ["0 0 0", "1 0 0", "0 1 0", "1 1 0", "0 0 1", "1 0 1", "0 1 1", "1 1 1"];
    for t in triples {
        cube.push_str(t);
        cube.push('\n');
    }
    let table = LookupTable::parse(cube.as_bytes()).unwrap();
    assert_eq!(table.data().len(), 32);
    assert!(table.data().iter().skip(3).step_by(4).all(|&a| a == 1.0));
}

#[tokio::test]
async fn test_manual_ticks_drop_not_queue() {
    let pipeline = FramePipeline::with_table(config(1), LookupTable::identity(2)).unwrap();
    let surface = Arc::new(MemorySurface::new(Extent::new(8, 8)));
    let mut consumer = pipeline.consumer(Arc::clone(&surface));

    let ticks = 20;
    let mut presented = 0;
    let mut seq = 0;
    for _ in 0..ticks {
        // Producer outruns the render clock ten to one
        for _ in 0..10 {
            pipeline.ingest(red_frame(seq));
            seq += 1;
        }
        if let TickOutcome::Presented { sequence } = consumer.tick() {
            // Always the newest frame, never a queued one
            assert_eq!(sequence, seq - 1);
            presented += 1;
        }
        pipeline.limiter().drained().await;
    }

    assert_eq!(presented, ticks);
    let snap = pipeline.metrics().snapshot();
    assert_eq!(snap.frames_ingested, 200);
    assert_eq!(snap.render.ticks, ticks);
    assert_eq!(snap.frames_overwritten, 200 - ticks);
}

#[tokio::test]
async fn test_first_tick_without_frame_is_skipped() {
    let pipeline = FramePipeline::with_table(config(2), LookupTable::identity(2)).unwrap();
    let mut consumer = pipeline.consumer(Arc::new(MemorySurface::new(Extent::new(4, 4))));
    assert_eq!(consumer.tick(), TickOutcome::NoFrame);
    assert_eq!(pipeline.limiter().in_flight(), 0);
    assert_eq!(pipeline.metrics().snapshot().render.no_frame, 1);
}

#[tokio::test]
async fn test_graded_frame_reaches_surface() {
    let dir = TempDir::new().unwrap();
    let lut = write_swap_cube(&dir);
    let cfg = PipelineConfig {
        lut: Some(lut),
        ..config(1)
    };
    let pipeline = FramePipeline::new(cfg, None).unwrap();
    let surface = Arc::new(MemorySurface::new(Extent::new(2, 2)));
    let mut consumer = pipeline.consumer(Arc::clone(&surface));

    pipeline.ingest(red_frame(0));
    assert_eq!(consumer.tick(), TickOutcome::Presented { sequence: 0 });
    pipeline.limiter().drained().await;

    let image = surface.last_presented().unwrap();
    // Red graded to blue, delivered as RGBA
    assert_eq!(&image.rgba[..4], &[0, 0, 255, 255]);
    assert_eq!(pipeline.metrics().snapshot().render.completions, 1);
}

#[tokio::test]
async fn test_lut_reload_mid_stream() {
    let dir = TempDir::new().unwrap();
    let lut = write_swap_cube(&dir);
    let pipeline = FramePipeline::with_table(config(1), LookupTable::identity(2)).unwrap();

    pipeline.ingest(red_frame(0));
    assert_eq!(&pipeline.relay().take().unwrap().data()[..4], &[0, 0, 255, 255]);

    pipeline.reload_lut_from_path(&lut).unwrap();
    pipeline.ingest(red_frame(1));
    assert_eq!(&pipeline.relay().take().unwrap().data()[..4], &[255, 0, 0, 255]);

    // A broken asset leaves the swap table in place
    fs::write(&lut, "LUT_3D_SIZE 2\n0 0 0\n").unwrap();
    assert!(pipeline.reload_lut_from_path(&lut).is_err());
    pipeline.ingest(red_frame(2));
    assert_eq!(&pipeline.relay().take().unwrap().data()[..4], &[255, 0, 0, 255]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_pipeline_bounded_by_render_clock() {
    let cfg = config(1);
    let pipeline = FramePipeline::with_table(cfg.clone(), LookupTable::identity(9)).unwrap();
    let surface = Arc::new(MemorySurface::new(Extent::new(cfg.surface_width, cfg.surface_height)));
    let consumer = pipeline.consumer(Arc::clone(&surface));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let started = Instant::now();
    let render = tokio::spawn(consumer.run(cfg.render_period(), shutdown_rx));

    // Unpaced producer: far faster than the 100 Hz render clock
    let producer = Producer::spawn(
        SyntheticSource::new(cfg.source_width, cfg.source_height, 0),
        Arc::clone(&pipeline),
        0,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(true).unwrap();
    render.await.unwrap();
    let elapsed = started.elapsed();
    let produced = tokio::task::spawn_blocking(move || producer.stop()).await.unwrap();
    pipeline.limiter().drained().await;

    // The interval fires once immediately, then once per period
    let clock_bound = (elapsed.as_nanos() / cfg.render_period().as_nanos()) as u64 + 2;
    let snap = pipeline.metrics().snapshot();
    assert!(snap.render.ticks >= 1);
    assert!(snap.render.ticks <= clock_bound, "{} ticks in {:?}", snap.render.ticks, elapsed);
    assert!(snap.render.presented <= clock_bound);
    assert!(produced > 2 * clock_bound, "producer only delivered {} frames", produced);
    assert_eq!(snap.frames_ingested, produced);
    assert_eq!(snap.render.completions, snap.render.presented);
    assert_eq!(pipeline.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_color_space_selects_lut() {
    let dir = TempDir::new().unwrap();
    let lut = write_swap_cube(&dir);
    let config_path = dir.path().join("pipeline.json");
    fs::write(
        &config_path,
        format!(r#"{{ "admission_capacity": 2, "luts": {{ "log": {:?} }} }}"#, lut),
    )
    .unwrap();

    let cfg = PipelineConfig::load(&config_path).unwrap();
    let pipeline = FramePipeline::new(cfg, Some(framegrade::ColorSpace::Log)).unwrap();
    assert_eq!(pipeline.luts().current().size(), 2);
    assert!(pipeline.luts().current().title().is_none());

    // sRGB has no entry and no default: identity
    pipeline.select_color_space(framegrade::ColorSpace::Srgb).unwrap();
    assert_eq!(pipeline.luts().current().title(), Some("identity"));
}

#[test]
fn test_lut_reload_during_ingest_never_mixes_tables() {
    use std::sync::atomic::{AtomicBool, Ordering};

    // Constant tables: every color maps to 0.25 (64) or 0.75 (191)
    let constant = |v: f32| {
        let mut s = String::from("LUT_3D_SIZE 3\n");
        for _ in 0..27 {
            s.push_str(&format!("{} {} {}\n", v, v, v));
        }
        s
    };
    let low = constant(0.25);
    let high = constant(0.75);

    let pipeline = FramePipeline::with_table(config(1), LookupTable::parse(low.as_bytes()).unwrap()).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let reloader = {
        let pipeline = Arc::clone(&pipeline);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            for i in 0..300 {
                let cube = if i % 2 == 0 { &high } else { &low };
                pipeline.reload_lut_from_bytes(cube.as_bytes()).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut seen = [0usize; 2];
    let mut seq = 0;
    while !done.load(Ordering::SeqCst) || seq < 500 {
        // Gradient so every pixel hits a different lattice cell
        let data: Vec<u8> = (0..64u32)
            .flat_map(|i| [(i * 4) as u8, (255 - i * 4) as u8, (i * 2) as u8, 255])
            .collect();
        let frame = Frame::new(data, 8, 8, PixelFormat::Bgra8, Duration::ZERO, seq).unwrap();
        pipeline.ingest(frame);
        seq += 1;

        let graded = pipeline.relay().take().unwrap();
        let first = graded.data()[0];
        assert!(first == 64 || first == 191, "unexpected channel value {}", first);
        for px in graded.data().chunks_exact(4) {
            assert_eq!(px, &[first, first, first, 255]);
        }
        seen[(first == 191) as usize] += 1;
    }
    reloader.join().unwrap();
    assert!(seen[0] + seen[1] >= 500);
}
