//! Status command implementation.

use courierdb_core::Engine;

/// Runs the status command.
pub fn run(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let (oldest, current) = engine.era_window();

    println!("owner:      {}", engine.owner());
    println!("format:     {}", engine.format());
    println!("era:        {current}");
    println!("oldest era: {oldest}");

    let senders = engine.senders()?;
    println!("senders:    {}", senders.len());
    for sender in senders {
        match engine.last_seen(&sender) {
            Some(era) => println!("  {sender} (last seen era {era})"),
            None => println!("  {sender}"),
        }
    }

    Ok(())
}
