mod config;
mod scheduler;

use std::path::PathBuf;

use anyhow::{Context, bail};
use fretflow_core::{HostEnvironment, PlaybackPosition, PlaybackState, PracticeSession};
use fretflow_project::{LoadedAnalysis, load_analysis, mock_song, practice_song};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::scheduler::TokioScheduler;

const USAGE: &str = "usage: fretflow-player [FILE] [--notes|--chords] [--speed X] [--save-speed]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Chords,
    Notes,
}

#[derive(Debug, PartialEq)]
struct Args {
    file: Option<PathBuf>,
    lane: Lane,
    speed: Option<f64>,
    /// Store `speed` as the default in the config file.
    save_speed: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut parsed = Args {
        file: None,
        lane: Lane::Notes,
        speed: None,
        save_speed: false,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--notes" => parsed.lane = Lane::Notes,
            "--chords" => parsed.lane = Lane::Chords,
            "--save-speed" => parsed.save_speed = true,
            "--speed" => {
                let value = args.next().context("--speed needs a value")?;
                let speed = value
                    .parse::<f64>()
                    .with_context(|| format!("invalid speed '{value}'"))?;
                parsed.speed = Some(speed);
            }
            flag if flag.starts_with("--") => bail!("unknown option '{flag}'\n{USAGE}"),
            path => {
                if parsed.file.is_some() {
                    bail!("only one song file can be played\n{USAGE}");
                }
                parsed.file = Some(PathBuf::from(path));
            }
        }
    }
    Ok(parsed)
}

fn load_song(args: &Args) -> anyhow::Result<LoadedAnalysis> {
    match &args.file {
        Some(path) => load_analysis(path).with_context(|| format!("failed to load {}", path.display())),
        None => {
            let demo = match args.lane {
                Lane::Chords => mock_song(),
                Lane::Notes => practice_song(),
            };
            Ok(LoadedAnalysis::from_result(&demo)?)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let mut config = Config::load();
    let song = load_song(&args)?;

    let timeline = match args.lane {
        Lane::Chords => song.chords,
        Lane::Notes => song.notes,
    };
    if timeline.is_empty() {
        bail!("nothing to play in the {:?} lane", args.lane);
    }
    info!(
        title = song.title.as_deref().unwrap_or("untitled"),
        events = timeline.len(),
        duration = %PlaybackPosition::from_ms(timeline.duration()),
        "starting practice"
    );

    let (scheduler, mut wakes) = TokioScheduler::new(config.practice.frame_interval_ms);
    let mut session = PracticeSession::from_config(timeline, &config.practice, HostEnvironment::realtime(scheduler));
    session.set_speed(args.speed.unwrap_or(config.speed))?;
    if let (true, Some(speed)) = (args.save_speed, args.speed) {
        config.speed = speed;
        config.save();
    }
    session.on_hit(|hit| {
        info!(
            at = %PlaybackPosition::from_ms(hit.event_time),
            play = %hit.payload,
            quality = %hit.quality,
            delta_ms = hit.delta.round(),
            "hit"
        );
    });

    session.play();
    if session.active_loop().is_none() {
        bail!("playback loop could not be scheduled");
    }

    let mut current_chord: Option<String> = None;
    while let Some(handle) = wakes.recv().await {
        let Some(frame) = session.on_wake(handle) else {
            continue;
        };

        let chord = frame.active_chord().map(str::to_owned);
        if chord != current_chord {
            if let Some(label) = &chord {
                info!(
                    at = %PlaybackPosition::from_ms(frame.time),
                    chord = %label,
                    next = frame.upcoming_chord().unwrap_or("-"),
                    "chord"
                );
            }
            current_chord = chord;
        }

        if frame.state == PlaybackState::Ended {
            info!(at = %PlaybackPosition::from_ms(frame.time), "song finished");
            break;
        }
    }

    Ok(())
}
