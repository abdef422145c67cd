//! `jdata-set` — patch one field of a BJData/JData file in place.
//!
//! Usage:
//!   jdata-set <file> <path> <json-value>
//!
//! The file is parsed once to recover the extent map, then the recorded byte
//! span for <path> is overwritten with the encoded new value. The write fails
//! cleanly when the value does not fit the existing slot.

use jdata::{parse_with_options, set_file, CodecRegistry, LoadOptions, Node};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: jdata-set <file> <path> <json-value>");
        std::process::exit(2);
    }
    let (file, path, value_text) = (&args[1], &args[2], &args[3]);

    let value: Node = match serde_json::from_str::<serde_json::Value>(value_text) {
        Ok(v) => Node::from(v),
        Err(e) => {
            eprintln!("invalid value: {e}");
            std::process::exit(2);
        }
    };

    let bytes = match std::fs::read(file) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{file}: {e}");
            std::process::exit(1);
        }
    };
    // Extents address the raw layout; reconstruction is not needed here.
    let opts = LoadOptions {
        raw: true,
        ..Default::default()
    };
    let doc = match parse_with_options(&bytes, &opts, &CodecRegistry::with_builtins()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{file}: {e}");
            std::process::exit(1);
        }
    };

    match set_file(file, &doc.extents, &[(path.as_str(), value)]) {
        Ok(outcomes) => {
            let outcome = &outcomes[0];
            if !outcome.found {
                eprintln!("{path}: no extent recorded for this path");
                std::process::exit(1);
            }
            if let Some(e) = &outcome.error {
                eprintln!("{path}: {e}");
                std::process::exit(1);
            }
            println!("{} bytes written", outcome.written.as_ref().map_or(0, Vec::len));
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
