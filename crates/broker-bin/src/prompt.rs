//! Terminal implementation of [`Prompter`]. Prompts and tables go to
//! stderr so stdout stays clean for `eval`.

use provider_hooks::output::render_table;
use provider_hooks::{Prompter, ProviderError, ProviderResult};
use std::io::{self, BufRead, Write};

pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(prompt: &str) -> ProviderResult<String> {
        eprint!("{}: ", prompt);
        io::stderr().flush().map_err(prompt_error)?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line).map_err(prompt_error)?;
        if read == 0 {
            return Err(ProviderError::Prompt("no input".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn choose(&self, title: &str, columns: &[&str], rows: &[Vec<String>]) -> ProviderResult<usize> {
        let mut header = vec!["#"];
        header.extend_from_slice(columns);
        let numbered: Vec<Vec<String>> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| std::iter::once(i.to_string()).chain(row.iter().cloned()).collect())
            .collect();

        eprintln!("{}", title);
        eprintln!("{}", render_table(&header, &numbered));
        parse_choice(&Self::read_line("Choice")?, rows.len())
    }

    fn text(&self, prompt: &str) -> ProviderResult<String> {
        Self::read_line(prompt)
    }

    fn secret(&self, prompt: &str) -> ProviderResult<String> {
        rpassword::prompt_password(format!("{}: ", prompt)).map_err(prompt_error)
    }

    fn status(&self, message: &str) {
        eprintln!("{}", message);
    }
}

fn parse_choice(input: &str, count: usize) -> ProviderResult<usize> {
    let choice: usize = input
        .trim()
        .parse()
        .map_err(|_| ProviderError::Prompt(format!("not a number: {}", input.trim())))?;
    if choice >= count {
        return Err(ProviderError::InvalidChoice {
            choice,
            max: count.saturating_sub(1),
        });
    }
    Ok(choice)
}

fn prompt_error(error: io::Error) -> ProviderError {
    ProviderError::Prompt(error.to_string())
}
