//! Peers command implementation.

use courierdb_core::Engine;

/// Runs the peers command.
pub fn run(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let senders = engine.senders()?;
    if senders.is_empty() {
        println!("no incoming scopes");
        return Ok(());
    }

    for sender in senders {
        match engine.last_seen(&sender) {
            Some(era) => println!("{sender}\tlast seen era {era}"),
            None => println!("{sender}\tnever synchronized"),
        }
    }

    Ok(())
}
