//! Colorlight - dry-run session
//!
//! Connects a small fleet of loopback fixtures and walks through the
//! controller: grouping, color, auto patterns, then music mode driven by a
//! synthetic tone (or the default microphone with `--mic`).
//!
//! Usage: `colorlight [CONFIG.json] [--mic]`

mod logging_setup;

use anyhow::{Context, Result};
use colorlight_control::{
    AudioCapture, ControlMode, ControllerConfig, FixtureId, GroupLabel, LightController,
    LinkChannel, LoopbackConnector, LoopbackLink, SyntheticCapture, TargetMode, Tone,
};
use colorlight_core::{EffectMode, Hsl};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEVICES: [&str; 3] = ["Colorlight-1", "Colorlight-2", "Colorlight"];

struct Args {
    config: Option<PathBuf>,
    mic: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = Args {
            config: None,
            mic: false,
        };
        for arg in std::env::args().skip(1) {
            if arg == "--mic" {
                args.mic = true;
            } else {
                args.config = Some(PathBuf::from(arg));
            }
        }
        args
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let path = args.config.clone().or_else(ControllerConfig::default_path);
    let config = ControllerConfig::load(path.as_deref())
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;

    let _log_guard = logging_setup::init(&config.logging)?;
    info!("Colorlight starting (dry run)");

    let controller = LightController::new(config);
    let links = connect_all(&controller).await?;

    run_color_session(&controller).await?;
    run_music_session(&controller, args.mic).await;

    controller.switch_mode(ControlMode::Color).await;
    controller.clear().await;

    for link in &links {
        println!(
            "{}: {} writes ({} colors, commands: {:?})",
            link.advertised_name(),
            link.write_count(),
            link.colors().len(),
            link.commands()
        );
    }

    info!("Colorlight finished");
    Ok(())
}

async fn connect_all(controller: &LightController) -> Result<Vec<Arc<LoopbackLink>>> {
    let connector = LoopbackConnector::new();
    let links: Vec<_> = DEVICES.iter().map(|name| connector.add_named(name)).collect();

    while connector.pending() > 0 {
        match controller.connect(&connector).await? {
            Some(fixture) => info!("Connected {} as {}", fixture.name(), fixture.id()),
            None => break,
        }
    }
    Ok(links)
}

async fn run_color_session(controller: &LightController) -> Result<()> {
    controller.assign_group(&FixtureId::new("1"), Some(GroupLabel::A));
    controller.assign_group(&FixtureId::new("2"), Some(GroupLabel::B));

    controller.set_target_mode(TargetMode::Group);
    controller.select_group(GroupLabel::B);
    if !controller.set_hex("#00c8ff") {
        warn!("Rejected hex color");
    }
    let report = controller.apply_current_color().await;
    info!("Group B: {} of {} fixtures updated", report.sent(), report.targeted());

    controller.set_target_mode(TargetMode::All);
    for hue in [0.0, 60.0, 120.0, 180.0, 240.0] {
        controller.set_hsl(Hsl::new(hue, 100.0, 50.0));
        controller.apply_color_debounced();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(controller.config().debounce_interval() * 2).await;
    info!("Color settled on {}", controller.current_hex());

    controller.switch_mode(ControlMode::Auto).await;
    controller.start_auto(3).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.stop_auto().await;
    Ok(())
}

fn capture_for(controller: &LightController, mic: bool) -> Box<dyn AudioCapture> {
    let analyzer = controller.config().analyzer.clone();

    #[cfg(feature = "audio")]
    if mic {
        return Box::new(colorlight_control::CpalCapture::new(analyzer));
    }
    #[cfg(not(feature = "audio"))]
    if mic {
        warn!("Built without the audio feature; using a synthetic tone");
    }

    Box::new(SyntheticCapture::new(
        vec![Tone::new(440.0, 0.6), Tone::new(659.25, 0.3)],
        analyzer,
    ))
}

async fn run_music_session(controller: &LightController, mic: bool) {
    let capture = capture_for(controller, mic);

    controller.switch_mode(ControlMode::Music).await;
    if let Err(e) = controller.start_music(capture.as_ref()).await {
        warn!("Music mode unavailable: {}", e);
        return;
    }

    for mode in [
        EffectMode::Frequency,
        EffectMode::Brightness,
        EffectMode::MusicalScale,
        EffectMode::Beat,
        EffectMode::Rainbow,
    ] {
        controller.set_effect_mode(mode);
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Some(output) = controller.audio_state().last_output {
            info!("{}: volume {:.0} -> {}", mode, output.adjusted_volume, output.color);
        }
    }

    controller.stop_music();
}
