//! Era maintenance commands: rotation, retirement, targeted drop.

use courierdb_core::{ChunkStorage, Engine, Era};
use tracing::info;

/// Runs the new-era command.
pub fn run_new_era(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let closed = engine.new_era()?;
    println!("closed era {closed}, now writing era {}", engine.era());
    Ok(())
}

/// Runs the retire command.
pub fn run_retire(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    match engine.retire_oldest_era()? {
        Some(retired) => println!("retired era {retired}, oldest is now {}", engine.oldest_era()),
        None => println!("nothing to retire: oldest era equals current era"),
    }
    Ok(())
}

/// Runs the drop-era command.
pub fn run_drop(engine: &Engine, era: u32) -> Result<(), Box<dyn std::error::Error>> {
    let era = Era::new(era);
    engine.chunk_storage().drop_chunks(era)?;
    info!(era = era.as_u32(), "local chunks dropped");
    Ok(())
}
