//! CLI entry point for photos-collage.
//!
//! `photos-collage --output out.jpg a.jpg gs://bucket/b.jpg ...`

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use photos_blob::BlobClient;
use photos_collage::{compose, decode, encode, output_target, ImageLocation, CELL_HEIGHT, CELL_WIDTH};
use photos_core::AppConfig;

#[derive(Parser)]
#[command(name = "photos-collage")]
#[command(about = "Combine photos into a grid collage")]
struct Cli {
    /// Output file or gs:// reference. `.jpg` is appended when there is no extension.
    #[arg(short, long, default_value = "collage.jpg")]
    output: String,

    /// Cell width in pixels.
    #[arg(long, default_value_t = CELL_WIDTH)]
    cell_width: u32,

    /// Cell height in pixels.
    #[arg(long, default_value_t = CELL_HEIGHT)]
    cell_height: u32,

    /// Config file prefix (default: photos).
    #[arg(short, long, default_value = "photos")]
    config: String,

    /// Input images, local paths or gs:// references.
    #[arg(required = true)]
    inputs: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let blob = BlobClient::from_config(&config.storage)?;

    let mut images = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let location = ImageLocation::parse(input);
        let bytes = location.read(&blob).await?;
        images.push(decode(&bytes)?);
        tracing::info!(input = %location, "Loaded image");
    }

    let canvas = compose(&images, cli.cell_width, cli.cell_height)?;
    let (name, format) = output_target(&cli.output)?;
    let bytes = encode(&canvas, format)?;

    let output = ImageLocation::parse(&name);
    output.write(&blob, bytes, format).await?;
    tracing::info!(
        output = %output,
        images = images.len(),
        width = canvas.width(),
        height = canvas.height(),
        "Collage written"
    );
    println!("{output}");

    Ok(())
}
