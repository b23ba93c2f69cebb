use std::{path::PathBuf, time::Instant};

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use pass::{
    Chain, ChainConfig, FrameInputs, ParamOverride, RenderDevice, SoftwareDevice,
    DEFAULT_CONFIG_FILE,
};

/// Runs one frame of the chain over an image on the CPU.
#[derive(Parser)]
#[command(name = "postfx-headless", version)]
struct Cli {
    /// Base color image
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the processed frame (PNG)
    #[arg(short, long)]
    output: PathBuf,

    /// Chain configuration; the default chain is used when the file is missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Frame time in seconds, seeds grain and glitch
    #[arg(short, long, default_value_t = 0.)]
    time: f32,

    /// Parameter value, `stage.param=value`
    #[arg(long = "set", value_name = "STAGE.PARAM=VALUE")]
    overrides: Vec<ParamOverride>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::builder()
        .parse_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"))
        .init();

    let cli = Cli::parse();
    let mut config = ChainConfig::load_or_default(&cli.config)
        .wrap_err_with(|| format!("Failed to load {}", cli.config.display()))?;

    let mut device = SoftwareDevice::new();
    let base = device
        .load_image(&cli.input)
        .wrap_err("Failed to load the input image")?;
    let extent = device
        .image_extent(base)
        .ok_or_else(|| color_eyre::eyre::eyre!("Input image vanished"))?;
    config.width = extent.width;
    config.height = extent.height;

    let mut chain = Chain::from_config(&config)?;
    for param in &cli.overrides {
        chain
            .apply_override(param)
            .wrap_err_with(|| format!("Failed to apply `{}.{}`", param.stage, param.param))?;
    }
    chain.load(&mut device, &config)?;

    let now = Instant::now();
    let output = chain.render_frame(&mut device, &FrameInputs::new(cli.time, base))?;
    log::info!(
        "Rendered [{}] at {extent} in {:?}",
        chain.names().collect::<Vec<_>>().join(" -> "),
        now.elapsed()
    );

    device
        .save_image(output, &cli.output)
        .wrap_err_with(|| format!("Failed to write {}", cli.output.display()))?;
    chain.unload(&mut device);
    device.destroy_image(base);
    Ok(())
}
