use diarize_rs::{read_wav, resample, DiarizationReport, DiarizeOptions, Diarizer};
use eyre::{bail, Result, WrapErr};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct CliArgs {
    audio: String,
    segment_model: String,
    embedding_model: String,
    options: DiarizeOptions,
    output: Option<String>,
    verbose: bool,
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} --audio <wav> --segment-model <onnx> --embedding-model <onnx> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --audio <path>            Input WAV file (required)");
    eprintln!("  --segment-model <path>    Segmentation ONNX model (required)");
    eprintln!("  --embedding-model <path>  Speaker embedding ONNX model (required)");
    eprintln!("  --threshold <f32>         Detection threshold, default 0.5");
    eprintln!("  --max-speakers <n>        Speaker cap, default 10");
    eprintln!("  --sample-rate <hz>        Pipeline sample rate, default 16000");
    eprintln!("  --output <path>           Write the JSON report here instead of stdout");
    eprintln!("  --verbose                 Debug logging");
    eprintln!("  --help, -h                Show this message");
}

fn parse_args() -> Result<Option<CliArgs>> {
    let mut argv = std::env::args();
    let program = argv.next().unwrap_or_else(|| "diarize-rs".into());

    let mut audio = String::new();
    let mut segment_model = String::new();
    let mut embedding_model = String::new();
    let mut options = DiarizeOptions::default();
    let mut output = None;
    let mut verbose = false;

    let next_value = |argv: &mut std::env::Args, flag: &str| -> Result<String> {
        argv.next()
            .ok_or_else(|| eyre::eyre!("{flag} requires a value"))
    };

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage(&program);
                return Ok(None);
            }
            "--audio" | "-a" => audio = next_value(&mut argv, &arg)?,
            "--segment-model" => segment_model = next_value(&mut argv, &arg)?,
            "--embedding-model" => embedding_model = next_value(&mut argv, &arg)?,
            "--threshold" | "-t" => {
                options.threshold = next_value(&mut argv, &arg)?
                    .parse()
                    .wrap_err("invalid --threshold")?
            }
            "--max-speakers" => {
                options.max_speakers = next_value(&mut argv, &arg)?
                    .parse()
                    .wrap_err("invalid --max-speakers")?
            }
            "--sample-rate" => {
                options.sample_rate = next_value(&mut argv, &arg)?
                    .parse()
                    .wrap_err("invalid --sample-rate")?
            }
            "--output" | "-o" => output = Some(next_value(&mut argv, &arg)?),
            "--verbose" | "-v" => verbose = true,
            other => bail!("unknown argument: {other}"),
        }
    }

    if audio.is_empty() || segment_model.is_empty() || embedding_model.is_empty() {
        print_usage(&program);
        bail!("--audio, --segment-model and --embedding-model are required");
    }

    Ok(Some(CliArgs {
        audio,
        segment_model,
        embedding_model,
        options,
        output,
        verbose,
    }))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };
    init_tracing(args.verbose);

    for path in [&args.audio, &args.segment_model, &args.embedding_model] {
        if !Path::new(path).exists() {
            bail!("file not found: {path}");
        }
    }

    let mut diarizer = Diarizer::new(
        &args.segment_model,
        &args.embedding_model,
        args.options.sample_rate,
    )?;

    let (samples, file_rate) = read_wav(&args.audio)?;
    let samples = if file_rate != args.options.sample_rate {
        info!(file_rate, pipeline_rate = args.options.sample_rate, "resampling");
        resample(&samples, file_rate, args.options.sample_rate)
    } else {
        samples
    };
    if samples.is_empty() {
        bail!("audio file is empty: {}", args.audio);
    }

    let segments = diarizer.process(&samples, &args.options)?;
    if segments.is_empty() {
        bail!("no segments generated");
    }

    let report = DiarizationReport::from_segments(&segments);
    for speaker in &report.speakers {
        info!(
            speaker = speaker.speaker_id,
            segments = speaker.segment_count,
            duration_secs = speaker.total_duration,
            "speaker summary"
        );
    }

    let json = report.to_json()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json).wrap_err_with(|| format!("failed to write {path}"))?;
            info!(path = %path, "results written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
