use anyhow::Result;
use clap::Parser;
use imu_recorder::{Clock, Recorder, SensorChannel, SensorSink, SystemClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "record-sim")]
#[command(about = "Record a synthetic IMU session end to end", long_about = None)]
struct Args {
    /// Recording duration in seconds
    #[arg(value_name = "SECONDS", default_value = "5")]
    duration: u64,

    /// Synthetic sample rate per channel in Hz
    #[arg(long, default_value = "200")]
    rate: u64,

    /// Base directory for session directories
    #[arg(long, default_value = "recordings")]
    output_dir: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let recorder = Arc::new(Recorder::new(&args.output_dir));
    let running = Arc::new(AtomicBool::new(true));

    // Synthetic sensor task: fixed-interval accel + gyro samples, feeding
    // the recorder the way a platform sensor listener would.
    let producer = {
        let recorder = Arc::clone(&recorder);
        let running = Arc::clone(&running);
        let period = Duration::from_nanos(1_000_000_000 / args.rate.max(1));
        thread::spawn(move || {
            let clock = SystemClock;
            let mut phase = 0.0f32;
            while running.load(Ordering::Relaxed) {
                let ts = clock.monotonic_ns();
                phase += 0.02;
                let accel = [0.4 * phase.sin(), 0.4 * phase.cos(), 9.81];
                let gyro = [0.1 * phase.cos(), -0.1 * phase.sin(), 0.02];
                recorder.on_sample(SensorChannel::Accelerometer, ts, &accel);
                recorder.on_sample(SensorChannel::Gyroscope, ts, &gyro);
                thread::sleep(period);
            }
        })
    };

    let dir = recorder.start()?;
    log::info!("Recording into {}", dir.display());

    let started = Instant::now();
    let total = Duration::from_secs(args.duration);
    let mut tapped = false;
    while started.elapsed() < total {
        thread::sleep(Duration::from_millis(500));

        if !tapped && started.elapsed() >= total / 2 {
            if let Err(e) = recorder.sync_tap() {
                log::warn!("Sync tap rejected: {}", e);
            } else {
                log::info!("Sync tap recorded");
            }
            tapped = true;
        }

        let status = recorder.status();
        log::info!(
            "{}s | accel {} @ {:.1} Hz | gyro {} @ {:.1} Hz",
            status.elapsed_seconds,
            status.accel_count,
            status.accel_rate_hz,
            status.gyro_count,
            status.gyro_rate_hz
        );
    }

    let dir = recorder.stop()?;
    running.store(false, Ordering::Relaxed);
    let _ = producer.join();

    log::info!("Recording complete: {}", dir.display());
    Ok(())
}
