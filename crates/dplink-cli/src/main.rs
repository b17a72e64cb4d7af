//! Inspector for self-describing native libraries: load one, bootstrap its
//! areas, and print every callable it advertises.

use std::env;
use std::process::ExitCode;

use dplink::{Bridge, BridgeError, NativeLibrary, DEFAULT_AREAS};

const USAGE: &str = "usage: dplink <library-path> [--root NAME] [--areas NAME,NAME,...]";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("dplink: {msg}");
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("dplink: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), CliError> {
    let mut path = None;
    let mut root = "dplink".to_string();
    let mut areas: Vec<String> = DEFAULT_AREAS.iter().map(|a| a.to_string()).collect();

    let mut iter = args.iter().cloned();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" => {
                let Some(value) = iter.next() else {
                    return Err(CliError::Usage("--root expects a value".to_string()));
                };
                root = value;
            }
            "--areas" => {
                let Some(value) = iter.next() else {
                    return Err(CliError::Usage("--areas expects a value".to_string()));
                };
                areas = value
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if arg.starts_with('-') => {
                return Err(CliError::Usage(format!("unknown flag {arg}")));
            }
            _ => {
                if path.is_some() {
                    return Err(CliError::Usage(format!("unexpected argument {arg}")));
                }
                path = Some(arg);
            }
        }
    }

    let Some(path) = path else {
        return Err(CliError::Usage("expected a library path".to_string()));
    };
    if areas.is_empty() {
        return Err(CliError::Usage("--areas must name at least one area".to_string()));
    }

    let lib = NativeLibrary::open(&path)?;
    let area_refs: Vec<&str> = areas.iter().map(String::as_str).collect();
    let bridge = Bridge::open(&lib, &root, &area_refs)?;

    for ns in bridge.areas() {
        println!("[{}]", ns.area());
        for f in ns.functions() {
            let params: Vec<String> = f.params().iter().map(|p| p.to_string()).collect();
            println!(
                "  {}{}({}) -> {}",
                ns.prefix(),
                f.name(),
                params.join(", "),
                f.ret()
            );
        }
        for (name, err) in ns.skipped() {
            println!("  ! {name}: skipped ({err})");
        }
    }
    for (area, err) in bridge.failures() {
        eprintln!("[{area}] failed to bootstrap: {err}");
    }

    Ok(())
}
