//! Test helper binary for precise I/O testing.
//!
//! Performs exactly one read or one write of a given size so integration
//! tests can attribute a known operation to this process's pid.
//!
//! Usage:
//!   test_io_helper read <file> <bytes>
//!   test_io_helper write <file> <bytes>

use std::env;
use std::fs::File;
use std::io::{Read, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() != 4 {
        eprintln!(
            "Usage: {} <read|write> <file> <bytes>",
            args.first().map(|s| s.as_str()).unwrap_or("test_io_helper")
        );
        return ExitCode::from(1);
    }

    let operation = &args[1];
    let file_path = &args[2];
    let bytes: usize = match args[3].parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Invalid byte count: {}", args[3]);
            return ExitCode::from(1);
        }
    };

    match operation.as_str() {
        "read" => {
            let mut file = match File::open(file_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Failed to open file: {}", e);
                    return ExitCode::from(1);
                }
            };

            let mut buffer = vec![0u8; bytes];
            if let Err(e) = file.read_exact(&mut buffer) {
                eprintln!("Failed to read: {}", e);
                return ExitCode::from(1);
            }
        }
        "write" => {
            let mut file = match File::create(file_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Failed to create file: {}", e);
                    return ExitCode::from(1);
                }
            };

            let buffer = vec![0x42u8; bytes];
            if let Err(e) = file.write_all(&buffer) {
                eprintln!("Failed to write: {}", e);
                return ExitCode::from(1);
            }

            // Ensure data is flushed
            if let Err(e) = file.sync_all() {
                eprintln!("Failed to sync: {}", e);
                return ExitCode::from(1);
            }
        }
        _ => {
            eprintln!("Unknown operation: {} (use 'read' or 'write')", operation);
            return ExitCode::from(1);
        }
    }

    ExitCode::SUCCESS
}
