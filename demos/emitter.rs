//! Pushes items from a producer thread through a buffered emitter.
//!
//! Run with: `cargo run --example emitter`

use std::thread;
use std::time::Duration;

use multiflow::{BufferedEmitter, EmitterConfig, StreamError};

fn main() -> Result<(), StreamError> {
    // drop-oldest buffer: a slow consumer sees only the newest readings
    let emitter = BufferedEmitter::new(EmitterConfig::latest(4));

    let producer = {
        let emitter = emitter.clone();
        thread::spawn(move || {
            for reading in 0..16 {
                emitter.emit(reading);
                thread::sleep(Duration::from_millis(5));
            }
            emitter.complete();
        })
    };

    thread::sleep(Duration::from_millis(40));
    let seen = emitter.multi().wait()?;
    println!("consumer saw {} readings: {seen:?}", seen.len());

    if producer.join().is_err() {
        println!("producer thread failed");
    }
    Ok(())
}
