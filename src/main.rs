use std::cell::RefCell;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Context;

use glitter::{GlitterError, Session};

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: glitter [script]");
        return ExitCode::FAILURE;
    }

    let result = if args.len() == 2 {
        run_file(&args[1])
    } else {
        run_prompt()
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn new_session() -> Session {
    let input: Rc<RefCell<dyn BufRead>> = Rc::new(RefCell::new(io::BufReader::new(io::stdin())));
    let output: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(io::stdout()));
    Session::new(input, output)
}

fn run_file(path: &str) -> anyhow::Result<ExitCode> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;

    let mut session = new_session();
    let mut had_error = false;
    session.run(&source, path, &mut |err| {
        had_error = true;
        report(&source, err);
    });

    Ok(if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_prompt() -> anyhow::Result<ExitCode> {
    let mut session = new_session();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read input")?;
        if read == 0 {
            // End of input behaves like !quit.
            break;
        }
        let line = line.trim().to_string();
        if line == "!quit" {
            break;
        }

        session.run(&line, "<repl>", &mut |err| report(&line, err));
    }
    Ok(ExitCode::SUCCESS)
}

/// One line of kind+message+position, then the offending source line with a
/// caret underline when the error has a span.
fn report(source: &str, err: &GlitterError) {
    eprintln!("{}", err);

    let Some(span) = err.span() else {
        return;
    };
    let offset = span.offset.min(source.len());
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());

    eprintln!("    {}", &source[line_start..line_end]);
    let column = source[line_start..offset].chars().count();
    let span_end = (span.offset + span.length).min(line_end).max(offset);
    let width = source[offset..span_end].chars().count().max(1);
    eprintln!("    {}{}", " ".repeat(column), "^".repeat(width));
}
