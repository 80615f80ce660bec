use anyhow::Context;
use clap::{Parser, ValueEnum};
use kl_compiler::ir::ast::printer::program_to_string;
use kl_compiler::ir::interp::{ExecConfig, Interpreter};
use kl_compiler::session::Session;
use kl_compiler::{compile_program, parse_source, CodegenOptions};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "klc")]
#[command(about = "Compiler for the kl expression language")]
struct Args {
    /// Path to the source file to compile. Without one, start the REPL.
    file: Option<PathBuf>,

    /// What to print for a compiled file
    #[arg(long, value_enum, default_value_t = Emit::Ir)]
    emit: Emit,

    /// Run the named function after compiling and print its result
    #[arg(long, value_name = "NAME")]
    run: Option<String>,

    /// Argument passed to the function given with --run (repeatable)
    #[arg(long = "arg", value_name = "X", allow_negative_numbers = true)]
    args: Vec<f64>,

    /// Skip structural verification of emitted functions
    #[arg(long)]
    no_verify: bool,

    /// Instruction budget for --run and REPL expressions
    #[arg(long, default_value_t = ExecConfig::default().fuel)]
    fuel: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Ast,
    Ir,
    None,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match &args.file {
        Some(path) => compile_file(path, &args),
        None => run_prompt(&args),
    };

    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn exec_config(args: &Args) -> ExecConfig {
    ExecConfig {
        fuel: args.fuel,
        ..ExecConfig::default()
    }
}

fn codegen_options(args: &Args, module_name: &str) -> CodegenOptions {
    CodegenOptions {
        module_name: module_name.to_string(),
        verify: !args.no_verify,
    }
}

fn compile_file(path: &Path, args: &Args) -> anyhow::Result<()> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("Error reading file '{}'", path.display()))?;

    let program = parse_source(&src)?;
    if args.emit == Emit::Ast {
        print!("{}", program_to_string(&program));
    }

    let module_name = path
        .file_stem()
        .map_or_else(|| "kl".to_string(), |s| s.to_string_lossy().into_owned());
    let module = compile_program(&program, &codegen_options(args, &module_name))?;
    if args.emit == Emit::Ir {
        print!("{module}");
    }

    if let Some(name) = &args.run {
        let stdout = io::stdout();
        let mut interp = Interpreter::new(&module, stdout.lock()).with_config(exec_config(args));
        let value = interp
            .run(name, &args.args)
            .with_context(|| format!("Running '{name}' failed"))?;
        drop(interp);
        println!("{value}");
    }
    Ok(())
}

/// Line-by-line REPL. Each line is compiled into the same module; the module
/// is printed once input ends.
fn run_prompt(args: &Args) -> anyhow::Result<()> {
    let mut session = Session::new(&codegen_options(args, "repl"), exec_config(args));
    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        input.clear();
        print!("> ");
        io::stdout().flush().context("Failed flush")?;

        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Failed read line: {e}");
                continue;
            }
        }

        match session.eval(input.trim()) {
            Ok(outcomes) => {
                for outcome in outcomes {
                    eprintln!("{}", outcome.ir);
                    print!("{}", outcome.output);
                    if let Some(value) = outcome.value {
                        println!("Evaluated to {value}");
                    }
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    print!("{}", session.module());
    Ok(())
}
