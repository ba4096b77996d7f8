use jsbridge::{Repl, VmInitParam};

#[derive(clap::Parser)]
#[command(name = "js", version, about = "Runs JavaScript on the jsbridge reference engine")]
struct Cli {
    /// Execute script
    #[arg(short, long)]
    eval: Option<String>,

    /// Engine parameters as a JSON file, e.g. `{ "max_call_depth": 500 }`
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// JavaScript file to execute
    file: Option<std::path::PathBuf>,
}

const INTERPRETER_STACK: usize = 64 * 1024 * 1024;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Initialize logger (controlled by RUST_LOG)
    env_logger::init();

    // The tree-walking evaluator recurses deeply; give it room on every platform.
    let builder = std::thread::Builder::new().stack_size(INTERPRETER_STACK);
    let handler = builder.spawn(run_main)?;
    match handler.join() {
        Ok(result) => result,
        Err(_) => Err("interpreter thread panicked".into()),
    }
}

fn run_main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = <Cli as clap::Parser>::parse();

    let param = match cli.config {
        Some(ref path) => VmInitParam::from_json(&std::fs::read_to_string(path)?)?,
        None => VmInitParam {
            stack_budget: INTERPRETER_STACK / 2,
            ..Default::default()
        },
    };
    log::debug!("engine parameters: {param:?}");

    let (script_content, file_name) = if let Some(script) = cli.eval {
        (script, "<eval>".to_string())
    } else if let Some(ref file) = cli.file {
        match std::fs::read_to_string(file) {
            Ok(content) => (content, file.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file {}: {e}", file.display());
                std::process::exit(1);
            }
        }
    } else {
        // No script argument -> start the interactive, persistent REPL
        run_persistent_repl(param)?;
        return Ok(());
    };

    let repl = Repl::with_param(param);
    match repl.eval_named(&script_content, &file_name) {
        Ok(result) => println!("{result}"),
        Err(message) => {
            eprintln!("Uncaught {message}");
            std::process::exit(1);
        }
    }
    Ok(())
}

// Persistent rustyline-powered REPL loop extracted into a helper to keep `main()` small.
fn run_persistent_repl(param: VmInitParam) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use rustyline::Editor;
    use rustyline::error::ReadlineError;
    use std::path::PathBuf;

    let ver = clap::crate_version!();
    println!("jsbridge REPL (persistent context) v{ver}. Type 'exit' or Ctrl-D to quit.");

    let mut rl = match Editor::<(), rustyline::history::FileHistory>::new() {
        Ok(e) => e,
        Err(err) => {
            eprintln!("Failed to initialize line editor: {err}");
            std::process::exit(1);
        }
    };

    let history_path: Option<PathBuf> = std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".jsbridge_history"));
    if let Some(ref p) = history_path
        && let Err(err) = rl.load_history(p)
    {
        log::debug!("no history loaded from {}: {err}", p.display());
    }

    let repl = Repl::with_param(param);

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "js> " } else { ".... " };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if buffer.is_empty() && (trimmed == "exit" || trimmed == ".exit") {
                    break;
                }

                if buffer.is_empty() {
                    buffer = line;
                } else {
                    buffer.push('\n');
                    buffer.push_str(&line);
                }

                // Keep reading while brackets, strings or comments are still open.
                if !Repl::is_complete_input(&buffer) {
                    continue;
                }

                if buffer.trim().is_empty() {
                    buffer.clear();
                    continue;
                }

                rl.add_history_entry(buffer.clone())?;

                match repl.eval(&buffer) {
                    Ok(val) => println!("{val}"),
                    Err(message) => eprintln!("Uncaught {message}"),
                }

                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye");
                break;
            }
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    if let Some(ref p) = history_path {
        rl.save_history(p)?;
    }
    Ok(())
}
