//! Terminal slide carousel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use postdesk_core::carousel::Carousel;

use super::App;
use crate::views::TerminalSlideView;

const DEFAULT_SLIDES: usize = 3;

pub async fn run(
    app: &App,
    slides: Option<usize>,
    interval_secs: Option<u64>,
    rounds: Option<u32>,
) -> Result<()> {
    let config = &app.config.carousel;
    let count = slides.unwrap_or(if config.slides.is_empty() {
        DEFAULT_SLIDES
    } else {
        config.slides.len()
    });
    if count == 0 {
        bail!("Carousel needs at least one slide");
    }
    let interval = interval_secs
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.interval());
    let rounds = rounds.unwrap_or(u32::try_from(count).unwrap_or(u32::MAX));
    let run_for = run_length(interval, rounds, config.transition())?;

    let view = Arc::new(TerminalSlideView::new(config.slides.clone()));
    let carousel = Carousel::from_config(count, config, view);
    let autoplay = carousel.spawn_autoplay(interval);

    tokio::time::sleep(run_for).await;
    autoplay.abort();
    Ok(())
}

/// Total playback time: every round plus the last transition.
fn run_length(interval: Duration, rounds: u32, transition: Duration) -> Result<Duration> {
    interval
        .checked_mul(rounds)
        .and_then(|total| total.checked_add(transition))
        .ok_or_else(|| anyhow!("Carousel run is too long ({rounds} rounds of {interval:?})"))
}
