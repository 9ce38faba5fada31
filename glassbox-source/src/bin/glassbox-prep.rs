use glassbox_source::{build_document, normalize, SourceError};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: glassbox-prep [--dump] <file> [more files...]");
        eprintln!();
        eprintln!("Normalizes each file and reports the inferred component.");
        eprintln!("With --dump, also prints the generated execution document.");
        process::exit(1);
    }

    let dump = args.iter().any(|a| a == "--dump");
    let mut exit_code = 0;

    for path in args[1..].iter().filter(|a| !a.starts_with("--")) {
        match prep_file(path, dump) {
            Ok(summary) => println!("✓ {} {}", path, summary),
            Err(e) => {
                eprintln!("✗ {}: {}", path, e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn prep_file(path: &str, dump: bool) -> Result<String, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read file: {}", e))?;
    let normalized = normalize(&raw);
    if normalized.is_empty() {
        return Err(SourceError::EmptySource.to_string());
    }
    let summary = format!(
        "-> component '{}' ({} bytes)",
        normalized.identifier(),
        normalized.source().len()
    );
    if dump {
        let document = build_document(&normalized);
        println!("{}", document.chunk());
    }
    Ok(summary)
}
