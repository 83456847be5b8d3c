mod commands;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, OnceLock};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trash_core::{parse, selected_token_indices, ParseOptions};
use trash_eval::{CallbackExecutor, EvalOptions, Machine, MemoryAliases, Session};

use commands::MachineHandle;

/// TraSH interactive command language.
#[derive(Parser)]
#[command(name = "trash", version, about = "TraSH command language interpreter")]
struct Cli {
    /// Log filter, e.g. "debug" or "trash_eval=trace"
    #[arg(long, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a script file
    Run {
        /// Path to the script
        file: PathBuf,
    },
    /// Evaluate an inline script
    Eval {
        /// Script text
        script: String,
        /// Suppress result printing
        #[arg(long)]
        silent: bool,
    },
    /// Interactive prompt
    Repl,
    /// List the registered commands
    Commands,
    /// Map a caret offset in a line to its command, argument, and value
    Assist {
        /// The input line
        line: String,
        /// Caret offset within the line
        caret: usize,
    },
}

fn build_runtime() -> (MachineHandle, MemoryAliases) {
    let aliases = MemoryAliases::new();
    let handle: MachineHandle = Arc::new(OnceLock::new());
    let registry = commands::build_registry(handle.clone(), aliases.clone());
    let machine = Machine::new(
        registry,
        Arc::new(CallbackExecutor),
        Arc::new(aliases.clone()),
    );
    let _ = handle.set(machine);
    (handle, aliases)
}

async fn eval_and_print(machine: &Machine, session: &Session, script: &str, silent: bool) -> bool {
    match machine
        .eval(script, session, &EvalOptions { silent })
        .await
    {
        Ok(results) => {
            if !silent {
                for value in results {
                    println!("= {}", value);
                }
            }
            true
        }
        Err(err) => {
            eprintln!("error: {}", err);
            false
        }
    }
}

async fn repl(machine: &Machine, session: &Session) {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("trash> ");
        if io::stdout().flush().is_err() {
            return;
        }
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            return;
        }
        eval_and_print(machine, session, input, false).await;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let (handle, _aliases) = build_runtime();
    let Some(machine) = handle.get() else {
        eprintln!("error: runtime failed to initialize");
        process::exit(1);
    };
    let session = Session::new();

    match cli.command {
        Commands::Run { file } => {
            let script = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(err) => {
                    eprintln!("error: cannot read {}: {}", file.display(), err);
                    process::exit(1);
                }
            };
            if !eval_and_print(machine, &session, &script, false).await {
                process::exit(1);
            }
        }
        Commands::Eval { script, silent } => {
            if !eval_and_print(machine, &session, &script, silent).await {
                process::exit(1);
            }
        }
        Commands::Repl => repl(machine, &session).await,
        Commands::Commands => {
            for def in machine.registry().iter() {
                let aliases = if def.aliases.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", def.aliases.join(", "))
                };
                println!("{}{} - {}", def.name, aliases, def.definition);
            }
        }
        Commands::Assist { line, caret } => {
            let parsed = match parse(&line, &ParseOptions::default()) {
                Ok(parsed) => parsed,
                Err(err) => {
                    eprintln!("error: {}", err);
                    process::exit(1);
                }
            };
            let mapping = selected_token_indices(&parsed, caret);
            let describe = |slot: Option<usize>| {
                slot.and_then(|i| parsed.tokens[0].get(i))
                    .map(|t| t.raw.clone())
                    .unwrap_or_else(|| "-".to_string())
            };
            println!("command:  {}", describe(mapping.command));
            println!("argument: {}", describe(mapping.argument));
            println!("value:    {}", describe(mapping.value));

            let token_value = |slot: Option<usize>| {
                slot.and_then(|i| parsed.tokens[0].get(i)).map(|t| t.value.clone())
            };
            if let (Some(command), Some(argument)) =
                (token_value(mapping.command), token_value(mapping.argument))
            {
                if let Some(def) = machine.registry().get(&command) {
                    let candidates = def.argument_options(&argument);
                    if !candidates.is_empty() {
                        let rendered: Vec<String> =
                            candidates.iter().map(|v| v.to_string()).collect();
                        println!("options:  {}", rendered.join(", "));
                    }
                }
            }
        }
    }
}
