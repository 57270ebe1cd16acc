use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use evcapture::capture::CancellationToken;
use evcapture::process::read_modules;
use evcapture::session::{CaptureOptions, CaptureSession};
use evcapture::symbols::{create_object_file, ElfFile, ObjectFile};

#[derive(Parser)]
#[command(name = "evcapture", version, about = "Profiler capture engine tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the modules mapped into a running process
    Modules { pid: i32 },
    /// Print the function symbols of an object file
    Symbols {
        file: PathBuf,
        /// Print demangled names
        #[arg(long)]
        demangled: bool,
    },
    /// Resolve an ELF address to its source line
    Line {
        file: PathBuf,
        /// Hexadecimal address, with or without 0x
        address: String,
    },
    /// Load a capture and print a summary
    Inspect {
        capture: PathBuf,
        #[command(flatten)]
        options: CaptureOptions,
    },
}

fn print_modules(pid: i32) -> anyhow::Result<()> {
    let modules = read_modules(pid)?;
    for module in &modules {
        println!(
            "{:#x}-{:#x} {:#x} {} {}",
            module.address_start,
            module.address_end,
            module.load_bias,
            module.build_id,
            module.file_path
        );
    }
    log::info!("{} modules in process {}", modules.len(), pid);
    Ok(())
}

fn print_symbols(file: PathBuf, demangled: bool) -> anyhow::Result<()> {
    let elf_file = match create_object_file(&file)? {
        ObjectFile::Elf(elf_file) => elf_file,
        ObjectFile::Coff { .. } => anyhow::bail!("{} is a COFF image", file.display()),
    };
    let symbols = elf_file
        .load_symbols()
        .with_context(|| format!("loading symbols of {}", file.display()))?;
    let load_bias = elf_file
        .load_bias()
        .with_context(|| format!("reading load bias of {}", file.display()))?;
    println!("build-id: {}", elf_file.build_id());
    println!("load bias: {:#x}", load_bias);
    for symbol in &symbols.symbol_infos {
        let name = if demangled {
            &symbol.demangled_name
        } else {
            &symbol.name
        };
        println!("{:#x} {:#x} {}", symbol.address, symbol.size, name);
    }
    Ok(())
}

fn print_line(file: PathBuf, address: &str) -> anyhow::Result<()> {
    let address = u64::from_str_radix(address.trim_start_matches("0x"), 16)
        .with_context(|| format!("invalid address {}", address))?;
    let mut elf_file = ElfFile::create(&file)?;
    if !elf_file.has_debug_info() {
        anyhow::bail!("{} has no debug info", file.display());
    }
    let line_info = elf_file.line_info(address)?;
    println!("{}:{}", line_info.source_file, line_info.source_line);
    Ok(())
}

fn inspect(
    capture: PathBuf,
    options: CaptureOptions,
    cancellation: CancellationToken,
) -> anyhow::Result<bool> {
    let mut session = CaptureSession::new(options);
    let complete = session
        .load_capture(&capture, &cancellation)
        .with_context(|| format!("loading {}", capture.display()))?;

    if let Some(target) = session.target() {
        println!("process: {} [{}]", target.name(), target.pid());
        println!("modules: {}", target.modules().count());
    }
    println!("selected functions: {}", session.selected_functions().len());
    for (address, function) in session.selected_functions() {
        println!(
            "  {:#x} {} calls={}",
            address,
            function.name,
            session.function_count(*address)
        );
    }
    println!("unique callstacks: {}", session.callstacks().len());
    println!("callstack events: {}", session.callstack_events().len());
    for (thread_id, timeline) in session.timelines() {
        let name = session.thread_name(*thread_id).unwrap_or("");
        println!(
            "thread {} {}: {} timers in {} blocks",
            thread_id,
            name,
            timeline.len(),
            timeline.num_blocks()
        );
    }
    Ok(complete)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    colog::init();

    match Cli::parse().command {
        Command::Modules { pid } => print_modules(pid),
        Command::Symbols { file, demangled } => print_symbols(file, demangled),
        Command::Line { file, address } => print_line(file, &address),
        Command::Inspect { capture, options } => {
            let cancellation = CancellationToken::new();
            let load = tokio::task::spawn_blocking({
                let cancellation = cancellation.clone();
                move || inspect(capture, options, cancellation)
            });
            tokio::pin!(load);

            let complete = tokio::select! {
                result = &mut load => result??,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Cancelling capture load");
                    cancellation.cancel();
                    load.await??
                }
            };
            if !complete {
                log::warn!("Capture load was cancelled");
            }
            Ok(())
        }
    }
}
