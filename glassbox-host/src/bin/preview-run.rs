use glassbox_host::{Outcome, PreviewConfig, PreviewHost};
use std::env;
use std::fs;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let mut config = PreviewConfig::default();
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if pos + 1 >= args.len() {
            eprintln!("--config requires a path");
            process::exit(1);
        }
        let path = args.remove(pos + 1);
        args.remove(pos);
        config = match PreviewConfig::from_yaml_file(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("✗ failed to load config {}: {}", path, e);
                process::exit(1);
            }
        };
    }

    if args.is_empty() {
        eprintln!("Usage: preview-run [--config config.yaml] <file>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  preview-run component.txt");
        eprintln!("  preview-run --config preview.yaml *.txt");
        process::exit(1);
    }

    let mut exit_code = 0;
    for file_path in args {
        let raw = match fs::read_to_string(&file_path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("✗ {}: failed to read file: {}", file_path, e);
                exit_code = 1;
                continue;
            }
        };

        let host = PreviewHost::new(config.clone());
        let mut outcomes = host.subscribe();
        host.submit(&raw);

        loop {
            if outcomes.changed().await.is_err() {
                eprintln!("✗ {}: preview host went away", file_path);
                exit_code = 1;
                break;
            }
            let outcome = outcomes.borrow_and_update().clone();
            match outcome {
                Outcome::Loading => continue,
                Outcome::Success => {
                    println!("✓ {} rendered", file_path);
                    break;
                }
                Outcome::Error(message) => {
                    eprintln!("✗ {} failed:", file_path);
                    eprintln!("  {}", message);
                    exit_code = 1;
                    break;
                }
            }
        }
    }

    process::exit(exit_code);
}
