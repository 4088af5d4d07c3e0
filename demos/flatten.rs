//! Merges inner sequences with a concurrency cap.
//!
//! Run with: `cargo run --example flatten`

use multiflow::{Multi, StreamError};

fn main() -> Result<(), StreamError> {
    // up to 3 pages in flight, 8 items prefetched per page
    let merged = Multi::range(0, 6)
        .flat_map(|page| fetch_page(page), 3, false, 8)
        .wait()?;
    println!("merged {} rows", merged.len());

    // serial variant: page order preserved end to end
    let ordered = Multi::range(0, 3)
        .concat_map(fetch_page)
        .wait()?;
    println!("ordered rows: {ordered:?}");
    Ok(())
}

fn fetch_page(page: i64) -> Multi<String> {
    Multi::range(page * 10, 4).map(move |row| format!("page{page}/row{row}"))
}
