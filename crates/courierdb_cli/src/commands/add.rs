//! Add command implementation.

use courierdb_core::Engine;
use tracing::info;

/// Runs the add command.
pub fn run(engine: &Engine, uri: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    engine.add(uri, message.as_bytes())?;
    info!(uri, era = engine.era().as_u32(), "message appended");
    Ok(())
}
