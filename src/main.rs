use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use film_driver::channel::ChannelKind;
use film_driver::demo::{DemoExporter, DemoHost};
use film_driver::settings::{HaltSettings, LayerSettings, RenderSettings};
use film_driver::{render, ErrorLog, LoopTiming, RenderContext};

#[derive(Parser, Debug)]
#[command(name = "film-driver")]
#[command(about = "Render session driver demo (synthetic engine)", long_about = None)]
struct Cli {
    /// Load render settings from a JSON file instead of the flags below
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 180)]
    height: u32,

    /// Halt after this many samples
    #[arg(long, default_value_t = 128)]
    samples: u32,

    /// Film refresh interval in seconds
    #[arg(long, default_value_t = 2.0)]
    interval: f32,

    /// Transparent film (RGBA combined output)
    #[arg(long)]
    transparent: bool,

    /// AOV channels to enable, e.g. --aov DEPTH --aov SHADING_NORMAL
    #[arg(long = "aov")]
    aovs: Vec<String>,

    /// Only export the scene to disk instead of rendering
    #[arg(long)]
    filesaver: bool,

    /// Synthetic sample rate of the demo engine
    #[arg(long, default_value_t = 64.0)]
    sample_rate: f32,
}

fn settings_from_cli(cli: &Cli) -> RenderSettings {
    let mut settings = RenderSettings {
        film_width: cli.width,
        film_height: cli.height,
        halt: HaltSettings {
            enable: true,
            use_samples: true,
            samples: cli.samples,
            ..HaltSettings::default()
        },
        layers: vec![LayerSettings {
            aovs: cli.aovs.iter().map(|name| ChannelKind::parse(name)).collect(),
            ..LayerSettings::new("RenderLayer")
        }],
        ..RenderSettings::default()
    };
    settings.imagepipeline.transparent_film = cli.transparent;
    settings.display.interval = cli.interval;
    settings.config.use_filesaver = cli.filesaver;
    settings
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            serde_json::from_str(&text).context("parsing settings file")?
        }
        None => settings_from_cli(&cli),
    };

    let started = chrono::Local::now();
    println!(
        "Starting render at {}",
        started.format("%Y-%m-%d %H:%M:%S")
    );

    let exporter = DemoExporter::new(settings.clone()).with_samples_per_second(cli.sample_rate);
    let mut ctx = RenderContext::new(Box::new(exporter));
    let mut host = DemoHost::new(&settings);
    let mut errorlog = ErrorLog::new();

    let result = render(&mut host, &mut ctx, &settings, &mut errorlog, &LoopTiming::default());

    for info in host.infos() {
        println!("{}", info);
    }
    for warning in errorlog.warnings() {
        eprintln!("Warning: {}", warning);
    }
    for error in errorlog.errors() {
        eprintln!("Error: {}", error);
    }
    result?;

    let elapsed = chrono::Local::now() - started;
    for layer in settings.enabled_layers() {
        if let Some(surface) = host.surface(&layer.name) {
            let mut names: Vec<_> = surface.pass_names().collect();
            names.sort_unstable();
            println!("Layer \"{}\" passes: {}", layer.name, names.join(", "));
        }
    }
    println!(
        "Finished in {}.{:03}s",
        elapsed.num_seconds(),
        elapsed.num_milliseconds() % 1000
    );
    Ok(())
}
