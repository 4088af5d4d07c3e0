//! Composes a small operator chain and blocks for the result.
//!
//! Run with: `cargo run --example pipeline`

use multiflow::{Multi, StreamError};

fn main() -> Result<(), StreamError> {
    let squares = Multi::range(1, 20)
        .map(|n| n * n)
        .filter(|n| n % 2 == 1)
        .skip(2)
        .limit(5)
        .wait()?;
    println!("odd squares (3rd..7th): {squares:?}");

    let first = Multi::range(1, 20)
        .drop_while(|n| *n < 10)
        .first()
        .wait()?;
    println!("first item >= 10: {first:?}");

    let recovered = Multi::<i64>::error(StreamError::message("upstream broke"))
        .on_error_resume_with(|_| Multi::range(-3, 3))
        .collect_list()
        .wait()?;
    println!("recovered: {recovered:?}");
    Ok(())
}
