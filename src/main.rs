use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};

use vowelsynth::audio::CpalBackend;
use vowelsynth::input::KeyboardHandler;
use vowelsynth::synth::config::SynthConfig;
use vowelsynth::synth::control::VowelSynth;
use vowelsynth::synth::source::SourceType;
use vowelsynth::synth::vowel;

/// Real-time source-filter vowel synthesizer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Output device (substring of its name)
    #[arg(long)]
    device: Option<String>,

    /// Glottal source: sawtooth, rosenberg or lf
    #[arg(long, default_value = "sawtooth")]
    source: SourceType,

    /// Fundamental frequency in Hz
    #[arg(long, default_value_t = 120.0)]
    f0: f32,

    /// Output volume, 0 to 1
    #[arg(long, default_value_t = 0.5)]
    volume: f32,

    /// Starting vowel as an IPA symbol
    #[arg(long)]
    vowel: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let start_vowel = match args.vowel.as_deref() {
        Some(ipa) => match vowel::find_by_ipa(ipa) {
            Some(v) => v,
            None => bail!("unknown vowel '{ipa}'"),
        },
        None => vowel::default_vowel(),
    };

    let mut synth = VowelSynth::new(CpalBackend::new(args.device), SynthConfig::default());
    synth.set_f0(args.f0)?;
    synth.set_volume(args.volume)?;
    synth.apply_vowel(start_vowel)?;
    synth.init().context("failed to open audio output")?;
    synth
        .set_source_type(args.source)
        .with_context(|| format!("failed to load the {} source", args.source))?;

    info!(
        vowel = start_vowel.ipa,
        source = %synth.source_type(),
        "ready: Space plays, 1-0 and - pick vowels, Tab cycles source, Esc quits"
    );

    let mut keyboard = KeyboardHandler::new();
    let mut last_report = Instant::now();
    while keyboard.update(&mut synth) {
        if synth.is_playing() && last_report.elapsed() >= Duration::from_secs(1) {
            if let Some(levels) = synth.levels() {
                info!(peak_db = levels.peak_db, rms_db = levels.rms_db, "level");
            }
            last_report = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    synth.stop()?;
    synth.suspend()?;
    Ok(())
}
