use consensus_track::{
    CenterDistanceScorer, Checkpoint, Detection, FrameInput, Orchestrator, TrackerConfig,
};
use tracing_subscriber::EnvFilter;

fn frame(boxes: &[(i32, i32)]) -> FrameInput {
    FrameInput {
        width: 640,
        height: 480,
        detections: boxes
            .iter()
            .map(|&(x, y)| Detection::new(x, y, x + 40, y + 60))
            .collect(),
        thumbnails: Vec::new(),
    }
}

fn main() -> consensus_track::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::from_json_file(path)?,
        None => TrackerConfig::default(),
    };
    let orchestrator = Orchestrator::new(CenterDistanceScorer::default(), config)?;

    // two objects drifting right, one leaves after frame 2, then an empty frame
    let frames = vec![
        frame(&[(100, 100), (300, 200)]),
        frame(&[(104, 101), (305, 200)]),
        frame(&[(108, 102), (310, 201)]),
        frame(&[(112, 103)]),
        frame(&[]),
        frame(&[(120, 105)]),
    ];

    let output = orchestrator.process_batch(Checkpoint::new(), &frames)?;
    for (index, detections) in output.detections.iter().enumerate() {
        let ids: Vec<_> = detections.iter().map(|d| d.track_id).collect();
        println!("frame {index}: track ids {ids:?}");
    }
    println!(
        "active tracks {}, next track id {}",
        output.checkpoint.tracks.len(),
        output.checkpoint.next_track_id
    );

    Ok(())
}
