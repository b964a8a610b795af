use hull::Shell;
use rustyline::{error::ReadlineError, DefaultEditor};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let shell = Shell::new();
    let interrupt = shell.interrupt().clone();
    ctrlc::set_handler(move || interrupt.set()).expect("Error setting Ctrl-C handler");

    let status = repl(&shell);
    std::process::exit(status);
}

fn repl(shell: &Shell) -> i32 {
    let config = rustyline::Config::builder()
        .color_mode(rustyline::ColorMode::Forced)
        .bell_style(rustyline::config::BellStyle::None)
        .build();
    let mut editor = match DefaultEditor::with_config(config) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Error: {err}");
            return 1;
        }
    };
    let _ = editor.load_history("history.txt");

    loop {
        // each line is a fresh operation with a fresh cancellation budget
        shell.interrupt().clear();
        match editor.readline("hull> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match shell.expand_line("<repl>", &line) {
                    Ok(words) => {
                        for word in words {
                            println!("{word}");
                        }
                    }
                    Err(err) if err.is_interrupt() => println!("^C"),
                    Err(err) => eprintln!("{:?}", miette::Report::new(err)),
                }
            }
            Err(ReadlineError::Interrupted) => println!("^C"),
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {err}");
                return 1;
            }
        }
    }
    let _ = editor.save_history("history.txt");
    0
}
