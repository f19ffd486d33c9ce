use eyefeat::{CompositeFeatureFinder, FeatureFinderConfig, Frame};
use image::ImageReader;
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <config.json> <image.png>", args[0]);
        std::process::exit(2);
    }

    let config = FeatureFinderConfig::from_json_file(Path::new(&args[1]))?;
    let image = ImageReader::open(&args[2])?.decode()?.to_luma8();

    let mut finder = CompositeFeatureFinder::with_config(config);
    let record = finder.analyze(&Frame::from_gray(&image), None)?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
