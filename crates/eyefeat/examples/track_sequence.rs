use eyefeat::{CompositeFeatureFinder, FeatureRecord, SyntheticEye};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let n_frames: u64 = match args.get(1) {
        Some(s) => s.parse()?,
        None => 10,
    };

    let eye = SyntheticEye {
        blur_sigma: Some(0.8),
        ..SyntheticEye::default()
    };
    let mut finder = CompositeFeatureFinder::new();
    let mut records: Vec<FeatureRecord> = Vec::new();

    for i in 0..n_frames {
        // slow horizontal drift
        let dx = 0.5 * i as f32;
        let frame = eye
            .shifted(dx, 0.0)
            .render()
            .with_frame_number(i)
            .with_timestamp(i as f64 / 60.0);
        let record = finder.analyze(&frame, records.last())?;
        println!(
            "frame {:>3}  {:?}  pupil {:?}  cr {:?}",
            i,
            record.status,
            record.pupil_position(),
            record.cr_position()
        );
        records.push(record);
    }

    let stats = finder.stats();
    println!(
        "{} reseeds, {} tracked, {} features lost",
        stats.reseeds, stats.tracked_frames, stats.features_lost
    );

    if let Some(out_path) = args.get(2) {
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
