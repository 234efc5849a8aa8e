use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scaled_tap_core::{
    AppConfig, AudioMix, DefectProbe, FaultPlan, Layout, PlaybackReport, ReferenceHost, Variant,
};
use tracing_subscriber::EnvFilter;

fn main() -> scaled_tap_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::List => run_list(&config),
        Commands::Describe { variant, json } => run_describe(&config, variant, json),
        Commands::Probe {
            variant,
            fail_every,
            json,
        } => run_probe(&config, variant, fail_every, json),
    }
}

fn run_list(config: &AppConfig) -> scaled_tap_core::Result<()> {
    let media = config.source.source_media();
    for variant in Variant::ALL {
        let composition = variant.build(&media, config.playback.gap_policy)?;
        let probe = DefectProbe::new(&composition);
        let verdict = if probe.predicts_dropout() {
            "dropout predicted"
        } else {
            "ok"
        };
        println!("{:<30}{:<20}{}", variant.name(), verdict, variant.description());
    }
    Ok(())
}

fn run_describe(config: &AppConfig, variant: Variant, json: bool) -> scaled_tap_core::Result<()> {
    tracing::info!(variant = variant.name(), "describing layout");

    let media = config.source.source_media();
    let composition = variant.build(&media, config.playback.gap_policy)?;
    let probe = DefectProbe::new(&composition);

    if json {
        let summary = serde_json::json!({
            "variant": variant,
            "duration": composition.duration(),
            "probe": probe,
            "tracks": composition
                .all_tracks()
                .iter()
                .map(|track| serde_json::json!({
                    "id": track.id(),
                    "kind": track.kind(),
                    "segments": track
                        .segments()
                        .iter()
                        .map(|segment| serde_json::json!({
                            "placement": segment.placement(),
                            "source": segment.source_range(),
                            "rate": segment.rate().ok(),
                        }))
                        .collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let layout = Layout::default();
    println!("{variant}: {}\n", variant.description());
    println!("{}\n", layout.diagram(&composition)?);
    println!("{}", layout.segment_table(&composition)?);
    for track in probe.at_risk_tracks() {
        println!("\ntrack {track} matches the dropout hypothesis");
    }
    Ok(())
}

fn run_probe(
    config: &AppConfig,
    variant: Option<Variant>,
    fail_every: Option<u32>,
    json: bool,
) -> scaled_tap_core::Result<()> {
    let variants = match variant.or(config.probe.variant) {
        Some(variant) => vec![variant],
        None => Variant::ALL.to_vec(),
    };
    let faults = FaultPlan::from_period(fail_every.or(config.probe.fail_every));
    let host = ReferenceHost::new(config.playback.clone()).with_faults(faults);
    let media = config.source.source_media();

    let mut reports = Vec::with_capacity(variants.len());
    for variant in variants {
        let composition = variant.build(&media, config.playback.gap_policy)?;
        let mix = AudioMix::source_range_taps(&composition, config.playback.pitch_algorithm);
        reports.push(host.run(Some(variant), &composition, mix)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    Ok(())
}

fn print_report(report: &PlaybackReport) {
    let name = report.variant.map(|variant| variant.name()).unwrap_or("composition");
    println!(
        "{name}: {} at {} Hz, {} frames per quantum, dropout {}",
        report.duration,
        report.sample_rate,
        report.quantum_frames,
        if report.predicted_dropout { "predicted" } else { "not predicted" },
    );
    for track in &report.tracks {
        println!(
            "  track {}: {} quanta, {}/{} frames, {} silent, {} failed, {} mismatched, \
             {} discontinuities",
            track.track,
            track.quanta,
            track.frames_produced,
            track.frames_requested,
            track.silent_quanta,
            track.retrieval_failures,
            track.mismatches.len(),
            track.discontinuities,
        );
        if track.log_overflowed > 0 {
            println!("    tap log dropped {} events", track.log_overflowed);
        }
        for mismatch in &track.mismatches {
            println!(
                "    quantum {} at {}: expected {}, observed {}",
                mismatch.quantum,
                mismatch.target,
                describe_range(mismatch.expected),
                describe_range(mismatch.observed),
            );
        }
    }
}

fn describe_range(range: Option<scaled_tap_core::TimeRange>) -> String {
    range.map_or_else(|| "none".to_string(), |range| range.to_string())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Probe audio taps on time-scaled composition segments",
    long_about = None
)]
struct Cli {
    /// Optional JSON config file; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every layout and whether it is expected to lose audio.
    List,
    /// Draw one layout and its segment table.
    Describe {
        /// Layout name, e.g. `two-audio-tracks`.
        variant: Variant,
        /// Print the layout as JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Play layouts through the reference host with a source-range tap on
    /// every audio track.
    Probe {
        /// Layout to probe; all layouts when omitted.
        variant: Option<Variant>,
        /// Fail source retrieval on every Nth quantum.
        #[arg(long)]
        fail_every: Option<u32>,
        /// Print the reports as JSON.
        #[arg(long)]
        json: bool,
    },
}
