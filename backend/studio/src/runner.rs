use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use sceneforge_renderer::RenderSink;

use crate::studio::Studio;

/// Totals over a `run_frames` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub frames: u64,
    pub drawn: usize,
    pub placeholders: usize,
    pub skipped: usize,
    pub faults: usize,
}

/// Tick `studio` `frames` times at `tick_hz`, passing the measured time
/// between ticks as the frame delta. Outcomes that arrive while waiting are
/// applied at the start of the next tick.
pub async fn run_frames(studio: &mut Studio, sink: &mut dyn RenderSink, frames: u64) -> RunSummary {
    let hz = studio.options().tick_hz.max(1);
    let period = Duration::from_secs_f64(1.0 / f64::from(hz));
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("[Runner] Running {} frames at {} Hz", frames, hz);
    let mut summary = RunSummary::default();
    let mut last = Instant::now();

    for _ in 0..frames {
        interval.tick().await;
        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f64();
        last = now;

        let report = studio.tick(delta, sink);
        summary.frames += 1;
        summary.drawn += report.drawn;
        summary.placeholders += report.placeholders;
        summary.skipped += report.skipped;
        summary.faults += report.faults.len();
        if !report.faults.is_empty() {
            debug!(frame = report.frame, faults = report.faults.len(), "[Runner] Frame had faults");
        }
    }

    info!(
        frames = summary.frames,
        drawn = summary.drawn,
        placeholders = summary.placeholders,
        "[Runner] Finished"
    );
    summary
}
