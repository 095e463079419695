use std::{
    collections::HashSet,
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use brainforge::{
    lexer::Lexer, Backend, CompileFlags, CompileOptions, Compiler, EofPolicy, Error,
    ExecutableBuilder, ExecutionEngine, Optimizations, Runtime,
};
use clap::{arg, command, Parser, ValueEnum};
use colored::Colorize;

/// Brainf**k compiler, native executables or straight to the JIT
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The file to operate on
    #[arg()]
    file: PathBuf,

    #[arg(value_enum)]
    commands: Vec<Commands>,

    /// Where to write the executable
    #[arg(short, long, default_value = "a.out")]
    output: PathBuf,

    #[arg(short, long, default_value_t = 30_000)]
    memory_size: usize,

    /// Run every optimization pass
    #[arg(short = 'O', long)]
    optimize: bool,

    /// Run just these passes
    #[arg(short, long, value_enum)]
    pass: Vec<Optimizations>,

    /// Attach source positions to the IR
    #[arg(short = 'g', long)]
    debug_info: bool,

    /// Execute in-process instead of writing an executable
    #[arg(short, long)]
    jit: bool,

    /// Print how often each instruction appears
    #[arg(short, long)]
    stats: bool,

    /// What `,` stores once input runs out
    #[arg(long, value_enum, default_value_t = EofPolicy::Zero)]
    eof: EofPolicy,
}

#[derive(ValueEnum, Debug, Clone, Hash, PartialEq, Eq)]
enum Commands {
    /// Output the instructions the lexer found
    Tokens,
    /// Output the IR as translated
    Ir,
    /// Output the IR after optimization
    OptimizedIr,
}

fn run(args: Args, source: Vec<u8>) -> Result<i32, Error> {
    let commands: HashSet<Commands> = HashSet::from_iter(args.commands.into_iter());

    eprintln!("Compiling {}", args.file.display());

    if commands.contains(&Commands::Tokens) {
        for token in Lexer::new(&source) {
            println!("{}\t{}\t{}", token.position, token.kind, token.kind.describe());
        }
    }

    let mut flags = CompileFlags::empty();
    flags.set(CompileFlags::OPTIMIZE, args.optimize);
    flags.set(CompileFlags::DEBUG_INFO, args.debug_info);

    let compiler = Compiler::new(CompileOptions {
        memory_size: args.memory_size,
        flags,
        passes: HashSet::from_iter(args.pass.into_iter()),
        module_name: args
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "brainforge".to_string()),
        file_name: Some(args.file.display().to_string()),
    });

    eprintln!("{}", "Starting translation".blue());
    let now = Instant::now();
    let compilation = compiler.compile(&source)?;
    eprintln!("{} {:.2?}", "Finished translation in".green(), now.elapsed());

    if args.stats {
        eprintln!("{}", compilation.statistics);
    }

    if commands.contains(&Commands::Ir) {
        println!("{}", compilation.module.ir());
    }

    if commands.contains(&Commands::OptimizedIr) {
        let optimized = compilation.module.clone().prepare()?;
        println!("{}", optimized);
    }

    let status = if args.jit {
        eprintln!("{}", "Starting jit".blue());
        let now = Instant::now();
        let mut engine = ExecutionEngine::new(Runtime::stdio().with_eof_policy(args.eof));
        let status = engine.consume(compilation.module)?;
        eprintln!();
        eprintln!("{} {:.2?}", "Finished jit in".green(), now.elapsed());
        status
    } else {
        eprintln!("{} {:?}", "Starting native codegen".blue(), compilation.module.passes());
        let now = Instant::now();
        let mut builder = ExecutableBuilder::new(&args.output).with_eof_policy(args.eof);
        let path = builder.consume(compilation.module)?;
        eprintln!(
            "{} {} in {:.2?}",
            "Finished linking".green(),
            path.display(),
            now.elapsed()
        );
        0
    };

    Ok(status)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let source = match std::fs::read(&args.file) {
        Ok(source) => source,
        Err(e) => {
            let message = format!("Couldn't read {}: {}", args.file.display(), e);
            eprintln!("{}", message.red());
            return ExitCode::FAILURE;
        }
    };

    match run(args, source) {
        Ok(status) => ExitCode::from(status as u8),
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            ExitCode::FAILURE
        }
    }
}
