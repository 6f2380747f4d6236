//! Interactive shell over a runtime with the stdlib installed

pub mod command;

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};

use crate::interp::{Binding, Runtime, Value};
pub use command::{literal_args, parse_line, parse_literal, split_args, CommandError, Line, Literal};

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = ".ferrule_history";

/// Result of one evaluated line
#[derive(Debug, Default, PartialEq)]
pub struct Evaluation {
    /// Non-void result of a call
    pub value: Option<Value>,
    /// Nonfatal reports and escaped errors produced by the line
    pub reports: Vec<String>,
}

/// Line evaluation without any terminal attached
pub struct Session {
    runtime: Runtime,
}

impl Session {
    pub fn new(runtime: Runtime) -> Self {
        Session { runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn eval_line(&mut self, line: &str) -> Result<Evaluation, CommandError> {
        let value = match parse_line(line)? {
            Line::Empty | Line::Meta(_) => None,
            Line::Let { name, value } => {
                let _ = self.runtime.run(|rt| {
                    let value = value.resolve(rt)?;
                    rt.assign(&name, value)?;
                    Ok(Value::void())
                });
                None
            }
            Line::Call { name, args } => self
                .runtime
                .run(|rt| {
                    let args = args
                        .into_iter()
                        .map(|arg| arg.resolve(rt))
                        .collect::<Result<Vec<_>, _>>()?;
                    rt.call_by_name(&name, args)
                })
                .ok()
                .filter(|value| !value.is_void()),
        };
        Ok(Evaluation {
            value,
            reports: self.runtime.take_reports(),
        })
    }

    /// Turn safe mode on; fails once the flag has been set either way
    pub fn enable_safe_mode(&mut self) -> crate::Result<()> {
        self.runtime.safe_mode_set(true)?;
        Ok(())
    }

    /// Registered signatures, one per line
    pub fn functions(&self) -> Vec<String> {
        self.runtime.functions().iter().map(|sig| sig.to_string()).collect()
    }

    /// Global variables as `name = value`
    pub fn variables(&self) -> Vec<String> {
        self.runtime
            .scopes()
            .global()
            .iter()
            .filter(|(_, _, binding)| !matches!(binding, Binding::Function(_)))
            .map(|(_, name, binding)| format!("{} = {}", name.unwrap_or("_"), binding.value()))
            .collect()
    }
}

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    session: Session,
    history_path: Option<PathBuf>,
}

impl Repl {
    pub fn new(runtime: Runtime) -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            session: Session::new(runtime),
            history_path,
        };
        if let Some(ref path) = repl.history_path {
            let _ = repl.editor.load_history(path);
        }
        Ok(repl)
    }

    pub fn run(&mut self) -> RlResult<()> {
        println!("ferrule {}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }
                    self.eval_input(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }

    /// Handle `:` commands; true means quit
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":quit" | ":q" | ":exit" => {
                println!("Goodbye!");
                true
            }
            ":help" | ":h" | ":?" => {
                print_help();
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            ":functions" | ":f" => {
                self.session.functions().iter().for_each(|line| println!("  {line}"));
                false
            }
            ":vars" | ":v" => {
                self.session.variables().iter().for_each(|line| println!("  {line}"));
                false
            }
            ":safe" => {
                match self.session.enable_safe_mode() {
                    Ok(()) => println!("Safe mode on."),
                    Err(err) => eprintln!("Error: {err}"),
                }
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }

    fn eval_input(&mut self, input: &str) {
        match self.session.eval_line(input) {
            Ok(evaluation) => {
                for report in &evaluation.reports {
                    eprintln!("{report}");
                }
                if let Some(value) = evaluation.value {
                    println!("{value}");
                }
            }
            Err(err) => eprintln!("Syntax error: {err}"),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help, :h, :?     Show this help");
    println!("  :quit, :q         Exit the REPL");
    println!("  :clear            Clear the screen");
    println!("  :functions, :f    List registered functions");
    println!("  :vars, :v         List global variables");
    println!("  :safe             Refuse privileged operations from now on");
    println!();
    println!("Lines:");
    println!("  name arg ...      Call a function; args are JSON, $var or bare words");
    println!("  let x = literal   Bind a global variable");
    println!();
    println!("Examples:");
    println!("  mkkeyarray x 1 y 2");
    println!("  let xs = [3, 1, 2]");
    println!("  fold add 0 $xs");
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
