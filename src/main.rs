use std::path::PathBuf;

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use pass::{ChainConfig, ParamOverride, DEFAULT_CONFIG_FILE};

/// Interactive postprocess chain over a ray-marched scene.
#[derive(Parser)]
#[command(name = "postfx", version)]
struct Cli {
    /// Chain configuration; the default chain is used when the file is missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Initial parameter value, `stage.param=value`
    #[arg(long = "set", value_name = "STAGE.PARAM=VALUE")]
    overrides: Vec<ParamOverride>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    app::init_logger();

    let cli = Cli::parse();
    let config = ChainConfig::load_or_default(&cli.config)
        .wrap_err_with(|| format!("Failed to load {}", cli.config.display()))?;

    app::run(config, &cli.overrides)
}
