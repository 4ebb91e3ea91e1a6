//! Remultiplexes a file or stdin into the requested container.
//!
//! ```text
//! cargo run --example remux -- input.mpg ps > output.mpg
//! cat capture.ts | cargo run --example remux -- - m2ts > output.m2ts
//! ```

use mpegremux::format::{FilterStream, Mux};
use std::env;
use std::fs::File;
use std::io::{self, Read};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "-".to_string());
    let mux: Mux = args.next().as_deref().unwrap_or("ps").parse()?;

    let input: Box<dyn Read + Send> = if path == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(&path)?)
    };
    log::info!("remuxing {} to {} ({})", path, mux, mux.content_type());

    let stream = FilterStream::spawn(mux.open(input), 16);
    let mut output = tokio::io::stdout();
    let written = stream.copy_to(&mut output).await?;

    log::info!("wrote {} bytes", written);
    Ok(())
}
