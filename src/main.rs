use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};

use den::{Expansion, Scope, ShellOptions, ShellVars};

#[derive(Parser)]
#[command(name = "den")]
#[command(about = "Expand shell words the way the den shell does")]
#[command(version)]
struct Cli {
    /// Expand this word and print the resulting fields
    #[arg(short = 'c')]
    word: Option<String>,

    /// Error on unset variables (set -u)
    #[arg(short = 'u', long = "nounset")]
    nounset: bool,

    /// Override IFS for field splitting
    #[arg(long = "ifs")]
    ifs: Option<String>,

    /// Seed variables as NAME=VALUE (repeatable)
    #[arg(long = "var")]
    vars: Vec<String>,

    /// Positional parameters ($1, $2, ...)
    #[arg()]
    params: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut vars = ShellVars::from_environment();
    if let Some(ifs) = &cli.ifs {
        if vars.set("IFS", ifs, Scope::Visible).is_err() {
            eprintln!("den: cannot set IFS");
            std::process::exit(1);
        }
    }
    for assignment in &cli.vars {
        match assignment.split_once('=') {
            Some((name, value)) => {
                if let Err(err) = vars.set(name, value, Scope::Visible) {
                    eprintln!("den: {}", err);
                    std::process::exit(1);
                }
            }
            None => {
                eprintln!("den: --var expects NAME=VALUE, got {:?}", assignment);
                std::process::exit(1);
            }
        }
    }
    vars.set_positional_params(cli.params.clone());

    let options = ShellOptions {
        nounset: cli.nounset,
        errexit: false,
    };

    let mut status = 0;
    if let Some(word) = cli.word {
        status = expand_and_print(&mut vars, options, &word);
    } else {
        // Interactive / piped: one word per line.
        let stdin = std::io::stdin();
        let interactive = stdin.is_terminal();
        loop {
            if interactive {
                print!("den> ");
                let _ = std::io::stdout().flush();
            }
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let word = line.trim_end_matches('\n');
            if word.is_empty() {
                continue;
            }
            status = expand_and_print(&mut vars, options, word);
        }
    }
    std::process::exit(status);
}

/// Expand one word against the store, print each field on its own line.
fn expand_and_print(vars: &mut ShellVars, options: ShellOptions, word: &str) -> i32 {
    let exec: den::ExecuteCommandFn = Box::new(|command: &str| run_via_shell(command));
    let mut expansion = Expansion::with_executor(vars, exec).with_options(options);

    let result = expansion.expand_word(word, false);
    let warnings = std::mem::take(&mut expansion.warnings);
    for warning in warnings {
        eprintln!("den: {}", warning);
    }
    match result {
        Ok(fields) => {
            for field in fields {
                println!("{}", field.text);
            }
            expansion.close_retained_fds();
            0
        }
        Err(err) => {
            eprintln!("den: {}", err);
            1
        }
    }
}

/// Execute-command callback for the standalone binary: without the full
/// executor around, substitution children run through a subordinate shell.
fn run_via_shell(command: &str) -> i32 {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    match std::process::Command::new(shell).arg("-c").arg(command).status() {
        Ok(status) => status.code().unwrap_or(127),
        Err(_) => 127,
    }
}
