//! `jdata-get` — query a BJData/JData file by path and print the result as
//! JSON.
//!
//! Usage:
//!   jdata-get <file> <path> [--raw] [--little-endian]

use jdata::{parse_with_options, query, CodecRegistry, Endian, LoadOptions};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut file = None;
    let mut path = None;
    let mut opts = LoadOptions::default();
    for arg in &args[1..] {
        match arg.as_str() {
            "--raw" => opts.raw = true,
            "--little-endian" => {
                opts.decode.endian = Endian::Little;
                opts.reconstruct.endian = Endian::Little;
            }
            other if file.is_none() => file = Some(other.to_string()),
            other if path.is_none() => path = Some(other.to_string()),
            other => {
                eprintln!("unexpected argument: {other}");
                std::process::exit(2);
            }
        }
    }
    let (Some(file), Some(path)) = (file, path) else {
        eprintln!("usage: jdata-get <file> <path> [--raw] [--little-endian]");
        std::process::exit(2);
    };

    let bytes = match std::fs::read(&file) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{file}: {e}");
            std::process::exit(1);
        }
    };
    let doc = match parse_with_options(&bytes, &opts, &CodecRegistry::with_builtins()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{file}: {e}");
            std::process::exit(1);
        }
    };
    match query(&doc.root, &path) {
        Ok(node) => {
            let json = serde_json::Value::from(node);
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
