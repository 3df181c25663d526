//! Messages command implementation.

use courierdb_core::{Engine, Era};

/// Runs the messages command.
pub fn run(
    engine: &Engine,
    uri: &str,
    from: Option<u32>,
    to: Option<u32>,
    reverse: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (oldest, current) = engine.era_window();
    let from_era = from.map(Era::new).unwrap_or(oldest);
    let to_era = to.map(Era::new).unwrap_or(current);

    let cache = engine.chunk_cache(uri, from_era, to_era)?;
    println!(
        "{} messages for {uri} in eras [{from_era}, {to_era}]",
        cache.size()
    );

    for position in 0..cache.size() {
        let payload = cache.message_at(position, !reverse)?;
        match std::str::from_utf8(payload) {
            Ok(text) => println!("{position}: {text}"),
            Err(_) => println!("{position}: <{} bytes>", payload.len()),
        }
    }

    Ok(())
}
