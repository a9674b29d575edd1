//! Capture a few frames from the synthetic backend and print what arrived.

use anyhow::Context;
use capture_bridge::capture::{
    ChannelKind, ContentFilter, Display, FrameInterval, MediaSample, Rect, StreamConfiguration, StreamId,
    SyntheticBackend,
};
use capture_bridge::logging::init_logging;
use capture_bridge::{Bridge, BridgeConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env().context("reading bridge configuration")?;
    init_logging(config.log_filter.as_deref());

    let bridge = Bridge::new(config, Arc::new(SyntheticBackend::default()))?;
    let filter = ContentFilter::display(Display::new(1, Rect::new(0.0, 0.0, 1280.0, 720.0), 2.0));
    let configuration = StreamConfiguration::new()
        .with_size(640, 360)
        .with_minimum_frame_interval(FrameInterval::new(1, 30));

    let (tx, rx) = std::sync::mpsc::channel();
    bridge.capture_image(filter.clone(), configuration.clone(), move |result| {
        let _ = tx.send(result);
    });
    let image = rx
        .recv_timeout(Duration::from_secs(5))
        .context("waiting for a still image")?
        .context("capturing a still image")?;
    tracing::info!("Still image: {}x{} ({} bytes)", image.width, image.height, image.data.len());

    let stream = bridge.create_stream(&filter, &configuration, None)?;
    let frames = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&frames);
    stream.add_output(
        ChannelKind::Video,
        Arc::new(move |_: StreamId, _: Arc<MediaSample>, _: ChannelKind| {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
        None,
    )?;

    bridge.block_on(stream.start()).context("starting stream")?;
    std::thread::sleep(Duration::from_millis(500));
    bridge.block_on(stream.stop()).context("stopping stream")?;

    tracing::info!("Received {} frames in 500ms", frames.load(Ordering::Relaxed));
    Ok(())
}
