//! Interactive session: list, then create or delete one instance.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use tracing::warn;

use crate::bench::BenchRunner;
use crate::config::Config;
use crate::providers::ComputeProvider;
use crate::remote::RemoteExecutor;

/// Machine type offered when prompting for creation.
pub const DEFAULT_MACHINE_TYPE: &str = "e2-micro";

/// Source of answers to interactive questions.
pub trait Prompter {
    /// Free-text answer, with an optional default.
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Index of the chosen item.
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize>;

    /// Yes/no answer.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Prompts on the terminal with dialoguer.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme).with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(0)
            .items(items)
            .interact()?)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }
}

/// Reads answers line by line, for when stdin is not a terminal.
///
/// Prompts go to `output`. An empty line takes the default. A selection is
/// either a 1-based index or an item itself.
pub struct LinePrompter<In, Out> {
    input: In,
    output: Out,
}

impl<In: BufRead, Out: Write> LinePrompter<In, Out> {
    /// Create a prompter over `input` and `output`.
    #[must_use]
    pub fn new(input: In, output: Out) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("Input ended while waiting for an answer");
        }
        Ok(line.trim().to_string())
    }
}

impl<In: BufRead, Out: Write> Prompter for LinePrompter<In, Out> {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let answer = match default {
            Some(default) => self.ask(&format!("{prompt} [{default}]: "))?,
            None => self.ask(&format!("{prompt}: "))?,
        };
        match default {
            Some(default) if answer.is_empty() => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
        writeln!(self.output, "{prompt}:")?;
        for (i, item) in items.iter().enumerate() {
            writeln!(self.output, "  {}) {item}", i + 1)?;
        }

        let answer = self.ask("> ")?;
        if let Ok(n) = answer.parse::<usize>() {
            if (1..=items.len()).contains(&n) {
                return Ok(n - 1);
            }
        }
        items
            .iter()
            .position(|item| *item == answer)
            .with_context(|| format!("Unknown selection: {answer}"))
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.ask(&format!("{prompt} [y/N]: "))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create an instance and collect benchmark results.
    Create,
    /// Delete one of the listed instances.
    Delete,
    /// Listing only.
    List,
}

impl std::str::FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            _ => Err(anyhow::anyhow!(
                "Unknown action: {s}. Supported: create, delete, list"
            )),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing beyond the listing.
    Listed,
    /// Instance created; results are `None` when retrieval failed.
    Created {
        name: String,
        results: Option<String>,
    },
    /// Instance deleted.
    Deleted(String),
    /// Delete requested but there was nothing to delete.
    NothingToDelete,
    /// The answer was not a known action.
    InvalidAction(String),
}

/// Prompt for a project ID if the configuration has none.
///
/// # Errors
/// Fails if prompting fails or the answer is still empty.
pub fn ensure_project_id<Pr, W>(config: &mut Config, prompter: &mut Pr, out: &mut W) -> Result<()>
where
    Pr: Prompter + ?Sized,
    W: Write,
{
    if let Err(e) = config.validate() {
        writeln!(out, "Configuration error: {e}")?;
        let project_id = prompter.input("Enter your GCP Project ID", None)?;
        config.project_id = project_id.trim().to_string();
        config.validate()?;
    }
    Ok(())
}

/// Create an instance, wait for its benchmarks and print the results.
///
/// A failed retrieval is reported and returned as `None`; the instance is
/// kept.
///
/// # Errors
/// Fails if creation fails.
pub async fn create_and_collect<P, R, W>(
    runner: &BenchRunner<P, R>,
    out: &mut W,
    name: &str,
    machine_type: &str,
    collect: bool,
) -> Result<Option<String>>
where
    P: ComputeProvider,
    R: RemoteExecutor,
    W: Write,
{
    runner
        .create_instance(out, name, machine_type)
        .await
        .context("Error creating instance")?;

    if !collect {
        return Ok(None);
    }

    runner.wait_for_benchmarks(out, name).await?;

    match runner.fetch_benchmark_results(name).await {
        Ok(results) => {
            writeln!(out, "Benchmark Results:")?;
            writeln!(out, "{results}")?;
            Ok(Some(results))
        }
        Err(e) => {
            warn!(name = %name, error = %e, "Benchmark retrieval failed; instance kept");
            writeln!(out, "Error retrieving benchmark results: {e}")?;
            Ok(None)
        }
    }
}

/// Run one interactive session.
///
/// # Errors
/// Listing, creation and deletion failures are returned; benchmark
/// retrieval failures are not.
pub async fn run<P, R, Pr, W>(
    runner: &BenchRunner<P, R>,
    prompter: &mut Pr,
    out: &mut W,
) -> Result<Outcome>
where
    P: ComputeProvider,
    R: RemoteExecutor,
    Pr: Prompter + ?Sized,
    W: Write,
{
    let instances = runner
        .list_instances(out)
        .await
        .context("Error listing instances")?;

    writeln!(out)?;
    let answer = prompter.input("Enter an action (create, delete, list)", None)?;
    let Ok(action) = answer.parse::<Action>() else {
        writeln!(
            out,
            "Invalid action. Please specify 'create', 'delete', or 'list'."
        )?;
        return Ok(Outcome::InvalidAction(answer));
    };

    match action {
        Action::List => Ok(Outcome::Listed),

        Action::Create => {
            let name = prompter
                .input("Enter the desired name for the new instance", None)?
                .trim()
                .to_string();
            if name.is_empty() {
                bail!("Instance name cannot be empty");
            }

            let machine_type = prompter
                .input(
                    "Enter the type of instance you want to create (e.g., e2-micro)",
                    Some(DEFAULT_MACHINE_TYPE),
                )?
                .trim()
                .to_string();

            let results = create_and_collect(runner, out, &name, &machine_type, true).await?;
            Ok(Outcome::Created { name, results })
        }

        Action::Delete => {
            if instances.is_empty() {
                writeln!(out, "No instances available to delete.")?;
                return Ok(Outcome::NothingToDelete);
            }

            let idx = prompter.select("Select the instance to delete", &instances)?;
            let Some(name) = instances.get(idx) else {
                bail!("Selection {idx} is out of range");
            };

            runner
                .delete_instance(out, name)
                .await
                .context("Error deleting instance")?;
            Ok(Outcome::Deleted(name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use super::*;

    struct Scripted {
        answers: VecDeque<String>,
    }

    impl Scripted {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| (*a).to_string()).collect(),
            }
        }
    }

    impl Prompter for Scripted {
        fn input(&mut self, _prompt: &str, default: Option<&str>) -> Result<String> {
            match self.answers.pop_front() {
                Some(a) if a.is_empty() => Ok(default.unwrap_or_default().to_string()),
                Some(a) => Ok(a),
                None => bail!("no scripted answer left"),
            }
        }

        fn select(&mut self, _prompt: &str, _items: &[String]) -> Result<usize> {
            Ok(self.input("", None)?.parse()?)
        }

        fn confirm(&mut self, _prompt: &str) -> Result<bool> {
            Ok(self.input("", None)? == "y")
        }
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("create".parse::<Action>().unwrap(), Action::Create);
        assert_eq!(" DELETE\n".parse::<Action>().unwrap(), Action::Delete);
        assert_eq!("List".parse::<Action>().unwrap(), Action::List);
        assert!("destroy".parse::<Action>().is_err());
    }

    #[test]
    fn test_ensure_project_id_prompts_when_missing() {
        let mut config = Config::default();
        let mut prompter = Scripted::new(&["  my-project  "]);
        let mut out = Vec::<u8>::new();

        ensure_project_id(&mut config, &mut prompter, &mut out).unwrap();

        assert_eq!(config.project_id, "my-project");
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Configuration error"));
    }

    #[test]
    fn test_ensure_project_id_rejects_blank_answer() {
        let mut config = Config::default();
        let mut prompter = Scripted::new(&["   "]);
        let mut out = Vec::<u8>::new();

        assert!(ensure_project_id(&mut config, &mut prompter, &mut out).is_err());
    }

    #[test]
    fn test_ensure_project_id_skips_prompt_when_set() {
        let mut config = Config {
            project_id: "set".to_string(),
            ..Config::default()
        };
        let mut prompter = Scripted::new(&[]);
        let mut out = Vec::<u8>::new();

        ensure_project_id(&mut config, &mut prompter, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_line_prompter_reads_piped_answers() {
        let input = Cursor::new("create\n\n2\nbench-b\nYes\n");
        let mut output = Vec::<u8>::new();
        let mut prompter = LinePrompter::new(input, &mut output);
        let items = vec!["bench-a".to_string(), "bench-b".to_string()];

        assert_eq!(prompter.input("Enter an action", None).unwrap(), "create");
        assert_eq!(
            prompter.input("Machine type", Some(DEFAULT_MACHINE_TYPE)).unwrap(),
            "e2-micro"
        );
        assert_eq!(prompter.select("Select", &items).unwrap(), 1);
        assert_eq!(prompter.select("Select", &items).unwrap(), 1);
        assert!(prompter.confirm("Delete?").unwrap());
        assert!(prompter.input("Anything else", None).is_err());

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Machine type [e2-micro]: "));
        assert!(output.contains("  2) bench-b\n"));
    }

    #[test]
    fn test_line_prompter_rejects_unknown_selection() {
        let mut prompter = LinePrompter::new(Cursor::new("3\nghost\n"), std::io::sink());
        let items = vec!["only".to_string()];

        assert!(prompter.select("Select", &items).is_err());
        assert!(prompter.select("Select", &items).is_err());
    }

    #[test]
    fn test_scripted_prompter_default() {
        let mut prompter = Scripted::new(&["", "2"]);
        assert_eq!(
            prompter.input("type", Some(DEFAULT_MACHINE_TYPE)).unwrap(),
            "e2-micro"
        );
        assert_eq!(prompter.select("pick", &[]).unwrap(), 2);
    }
}
