// In src/main.rs

//! Walkthrough binary: runs the four lane-processing scenarios and logs
//! what each one did.

use anyhow::Context;
use lanework::backend::{NativeF32, NativeI32, NativeI64};
use lanework::config::CONFIG_PATH_ENV;
use lanework::features::{CpuFeatures, DETECTED};
use lanework::{
    AlignedBuffer, Backend, BinaryOp, Engine, EngineConfig, IndexSet, Op, RecordShape,
    RecordTransposer,
};
use log::{info, warn};

/// Scattered offsets walked by the gather/scatter scenario, in lane order.
const WALK: [usize; 16] = [69, 31, 18, 3, 11, 6, 2, 73, 53, 35, 40, 20, 7, 10, 5, 1];

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => {
            let config = EngineConfig::from_path(&path)
                .with_context(|| format!("loading config from {}", path))?;
            info!("Configuration loaded from {}.", path);
            Ok(config)
        }
        Err(_) => {
            info!("Configuration loaded (using default).");
            Ok(EngineConfig::default())
        }
    }
}

fn report_platform() -> anyhow::Result<()> {
    let detected = *DETECTED;
    let compiled = CpuFeatures::compiled();
    info!(
        "cpu: {}",
        serde_json::to_string(&detected).context("serializing detected features")?
    );
    info!(
        "native backends: {} ({} lanes), {} ({} lanes), {} ({} lanes)",
        NativeF32::NAME,
        NativeF32::LANES,
        NativeI32::NAME,
        NativeI32::LANES,
        NativeI64::NAME,
        NativeI64::LANES
    );
    if detected.contains(CpuFeatures::AVX512F) && !CpuFeatures::native_avx512() {
        warn!(
            "CPU supports AVX-512 but this build targets {:?}; rebuild with -C target-feature=+avx512f",
            compiled
        );
    }
    Ok(())
}

/// 16 floats loaded from aligned storage, added, stored back.
fn basics(config: &EngineConfig) -> anyhow::Result<()> {
    let engine = Engine::<NativeF32>::new(config.clone());
    let lanes = engine.lanes();
    let a = AlignedBuffer::from_fn(lanes, |i| i as f32 * 0.5);
    let b = AlignedBuffer::from_fn(lanes, |i| 1.0 + i as f32);
    let mut c = AlignedBuffer::<f32>::zeroed(lanes);

    let x = engine.load(&a, 0, lanes, None).context("loading a")?;
    let y = engine.load(&b, 0, lanes, None).context("loading b")?;
    let z = engine.apply(&Op::Add, x, y, None)?;
    engine.store(&mut c, 0, z, lanes, None).context("storing c")?;
    info!("basics: {:?}", c.as_slice());
    Ok(())
}

/// Two 18-element arrays added with a masked tail.
fn masks(config: &EngineConfig) -> anyhow::Result<()> {
    let engine = Engine::<NativeI64>::new(config.clone());
    let a = AlignedBuffer::from_fn(18, |i| i as i64 + 1);
    let b = AlignedBuffer::from_fn(18, |i| (i as i64 + 1) * 100);
    let mut c = AlignedBuffer::<i64>::zeroed(18);

    let plan = engine.plan(a.capacity())?;
    info!(
        "masks: {} full chunks of {}, tail of {}",
        plan.full_chunks(),
        plan.lanes(),
        plan.tail_len()
    );
    if plan.tail_len() > 0 {
        info!("masks: tail mask {:?}", engine.tail_mask(plan.tail_len())?);
    }
    engine
        .zip_with(&Op::Add, &a, &b, &mut c)
        .context("adding with tail mask")?;
    info!("masks: {:?}", c.as_slice());
    Ok(())
}

/// Gather scattered values, add 100, scatter them back.
fn gathering_scattering(config: &EngineConfig) -> anyhow::Result<()> {
    let engine = Engine::<NativeI32>::new(config.clone());
    let mut data = AlignedBuffer::from_fn(128, |i| i as i32 + 1);
    let lanes = engine.lanes();
    let indices = IndexSet::from_slice(&WALK[..lanes], lanes).context("building index set")?;

    let gathered = engine.gather(&data, &indices, None)?;
    info!("gather: {:?}", NativeI32::to_vec(gathered));
    engine
        .gather_apply_scatter(&mut data, &indices, &Op::Add, 100, None)
        .context("gather/add/scatter")?;
    let touched: Vec<(usize, i32)> = WALK[..lanes].iter().map(|&i| (i, data[i])).collect();
    info!("scatter: {:?}", touched);
    Ok(())
}

/// xyz points translated field-wise in SoA form, restored to AoS.
fn data_reorganization(config: &EngineConfig) -> anyhow::Result<()> {
    let engine = Engine::<NativeF32>::new(config.clone());
    let shape = RecordShape::new(3, engine.lanes())?;
    let transposer = RecordTransposer::new(shape);
    let records = 8;
    let mut points: Vec<f32> = (0..records * 3).map(|i| i as f32).collect();

    let mut xs = vec![0.0; records];
    let mut ys = vec![0.0; records];
    let mut zs = vec![0.0; records];
    engine.deinterleave(
        &transposer,
        &points,
        &mut [xs.as_mut_slice(), ys.as_mut_slice(), zs.as_mut_slice()],
    )?;
    info!("soa: x={:?} y={:?} z={:?}", xs, ys, zs);

    engine
        .transform_records(&mut points, &transposer, &[10.0, 20.0, 30.0], BinaryOp::Add)
        .context("translating points")?;
    info!("translated aos: {:?}", points);
    Ok(())
}

/// Main entry point for the `lanework` walkthrough.
fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting lanework...");
    let config = load_config()?;
    report_platform()?;

    basics(&config).context("basics scenario")?;
    masks(&config).context("masks scenario")?;
    gathering_scattering(&config).context("gather/scatter scenario")?;
    data_reorganization(&config).context("data reorganization scenario")?;

    info!("lanework finished.");
    Ok(())
}
