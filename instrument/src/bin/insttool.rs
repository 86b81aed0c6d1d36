//! Standalone harness for exercising the rewriter against a `.ll` fixture
//! without going through a full compiler driver. Intended for manual
//! inspection and fixture authoring, not the production instrumentation
//! path (that's the driver that calls [`trace2pass_instrument::rewrite_module`]
//! from within a build).

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use llvm_sys::core::{LLVMContextCreate, LLVMContextDispose, LLVMDisposeModule};
use trace2pass_instrument::{parse_module, print_module, rewrite_module, verify_module, InstrumentMode};

#[derive(Parser)]
#[command(name = "insttool", about = "Rewrite an LLVM IR file with trace2pass checks")]
struct Cli {
    /// Path to a `.ll` textual IR file.
    input: String,

    /// Write the rewritten IR here instead of stdout.
    #[arg(long)]
    output: Option<String>,

    /// Instrument all eight check categories instead of just the production set.
    #[arg(long)]
    all_checks: bool,

    /// Skip running LLVM's verifier over the rewritten module.
    #[arg(long)]
    skip_verify: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let ir = match fs::read_to_string(&cli.input) {
        Ok(ir) => ir,
        Err(err) => {
            eprintln!("insttool: failed to read {}: {err}", cli.input);
            return ExitCode::FAILURE;
        }
    };

    let mode = if cli.all_checks {
        InstrumentMode::AllChecks
    } else {
        InstrumentMode::Production
    };

    unsafe {
        let context = LLVMContextCreate();
        let module = match parse_module(context, &ir, &cli.input) {
            Ok(module) => module,
            Err(err) => {
                eprintln!("insttool: {err}");
                LLVMContextDispose(context);
                return ExitCode::FAILURE;
            }
        };

        let sites = rewrite_module(context, module, mode);
        eprintln!("insttool: instrumented {sites} site(s)");

        if !cli.skip_verify {
            if let Err(err) = verify_module(module) {
                eprintln!("insttool: {err}");
                LLVMDisposeModule(module);
                LLVMContextDispose(context);
                return ExitCode::FAILURE;
            }
        }

        let text = print_module(module);
        let result = match cli.output {
            Some(path) => fs::write(&path, &text).map_err(|err| err.to_string()),
            None => {
                print!("{text}");
                Ok(())
            }
        };

        LLVMDisposeModule(module);
        LLVMContextDispose(context);

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("insttool: failed to write output: {err}");
                ExitCode::FAILURE
            }
        }
    }
}
