//! Question answering over documentation (`ask_docs`)
//!
//! The search core never talks to a language model. Answer generation is an
//! [`Answerer`] injected into the MCP server; without one, `ask_docs` hands
//! the gathered context back to the calling agent.

use crate::error::{Error, Result};
use crate::service::DocService;
use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default character budget for gathered context
pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 4000;

/// Default bound on one run of an answer command
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(120);

/// Documents consulted when the caller names none
const AUTO_CONTEXT_DOCS: usize = 3;

/// Characters of context echoed back when no answer is generated
const CONTEXT_PREVIEW_CHARS: usize = 500;

const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant documentation to answer your question.";

/// Generates a free-text answer from a question and supporting text
pub trait Answerer: Send + Sync {
    /// Short identifier reported alongside answers
    fn name(&self) -> &str;

    fn answer(&self, question: &str, context: &str) -> Result<String>;
}

/// Answers by piping a prompt into an external command and reading its stdout
///
/// Works with any CLI that reads a prompt on stdin, e.g. `llm -m gpt-4o-mini`
/// or `claude -p`. The prompt is written while output is collected, and the
/// child is killed once the timeout expires.
#[derive(Debug, Clone)]
pub struct CommandAnswerer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAnswerer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandAnswerer {
            program: program.into(),
            args,
            timeout: DEFAULT_ANSWER_TIMEOUT,
        }
    }

    /// Split a whitespace-separated command line; `None` if it is blank
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(CommandAnswerer::new(program, parts.collect()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, prompt: String) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Answer(format!("failed to start {}: {}", self.program, e)))?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // The command may exit before reading everything
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    tracing::debug!("Prompt not fully written: {}", e);
                }
            }
        };
        let finished = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = match tokio::time::timeout(self.timeout, finished).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(Error::Answer(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs_f64()
                )))
            }
        };

        if !output.status.success() {
            return Err(Error::Answer(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let answer = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if answer.is_empty() {
            return Err(Error::Answer(format!("{} returned no output", self.program)));
        }
        Ok(answer)
    }
}

impl Answerer for CommandAnswerer {
    fn name(&self) -> &str {
        &self.program
    }

    /// Runs on its own single-threaded runtime, so callers may be plain
    /// threads or the blocking pool.
    fn answer(&self, question: &str, context: &str) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(build_prompt(question, context)))
    }
}

/// Command-line flags that configure answer generation
#[derive(Args, Debug, Clone, PartialEq)]
pub struct AnswerArgs {
    /// Command that answers ask_docs questions (prompt on stdin, answer on stdout)
    #[arg(long, env = "DOCDEX_ANSWER_COMMAND")]
    pub answer_command: Option<String>,

    /// Kill the answer command after this many seconds
    #[arg(long, default_value_t = DEFAULT_ANSWER_TIMEOUT.as_secs())]
    pub answer_timeout_secs: u64,
}

impl AnswerArgs {
    /// The configured answerer, if a non-blank command was given
    pub fn answerer(&self) -> Option<CommandAnswerer> {
        let answerer = CommandAnswerer::from_command_line(self.answer_command.as_deref()?)?;
        Some(answerer.with_timeout(Duration::from_secs(self.answer_timeout_secs)))
    }
}

/// Prompt sent to an answering model
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based on provided documentation. \
         Only use information from the provided context.\n\n\
         Based on the following documentation, please answer this question: {}\n\n\
         Documentation:\n{}\n\n\
         Please provide a clear, concise answer based only on the provided documentation.",
        question, context
    )
}

/// Arguments of `ask_docs`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Paths to use as context; searched for when absent or empty
    #[serde(default)]
    pub context_docs: Option<Vec<String>>,
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
}

fn default_max_context_length() -> usize {
    DEFAULT_MAX_CONTEXT_LENGTH
}

/// Context assembled for a question
#[derive(Debug, Clone, PartialEq)]
pub struct GatheredContext {
    pub text: String,
    pub sources: Vec<String>,
    /// Characters of document content included
    pub length: usize,
}

/// Collect document text for `request`, truncating to its character budget
pub fn gather_context(service: &DocService, request: &AskRequest) -> Result<GatheredContext> {
    let paths = match &request.context_docs {
        Some(paths) if !paths.is_empty() => paths.clone(),
        _ => service
            .search_docs(&request.question, Some(AUTO_CONTEXT_DOCS))?
            .into_iter()
            .map(|hit| hit.path)
            .collect(),
    };

    let mut parts = Vec::new();
    let mut sources = Vec::new();
    let mut length = 0;

    for path in paths {
        if length >= request.max_context_length {
            break;
        }
        let doc = match service.get_doc(&path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("ask_docs skipping {}: {}", path, e);
                continue;
            }
        };

        let remaining = request.max_context_length - length;
        let content = truncate_chars(&doc.content, remaining);
        length += content.chars().count();
        parts.push(format!("--- {} ---\n{}", doc.path, content));
        sources.push(doc.path.clone());
    }

    Ok(GatheredContext {
        text: parts.join("\n\n"),
        sources,
        length,
    })
}

/// Answer `request`, using `answerer` when one is configured
pub fn ask(service: &DocService, answerer: Option<&dyn Answerer>, request: &AskRequest) -> Result<Value> {
    let context = gather_context(service, request)?;

    if context.sources.is_empty() {
        return Ok(json!({
            "answer": NO_CONTEXT_ANSWER,
            "sources": [],
            "confidence": "low"
        }));
    }

    let preview = truncate_chars(&context.text, CONTEXT_PREVIEW_CHARS);

    let Some(answerer) = answerer else {
        return Ok(json!({
            "question": request.question,
            "context": preview,
            "sources": context.sources,
            "contextLength": context.length,
            "note": "No answer generator configured; use the context and sources to answer."
        }));
    };

    match answerer.answer(&request.question, &context.text) {
        Ok(answer) => Ok(json!({
            "answer": answer,
            "sources": context.sources,
            "contextLength": context.length,
            "model": answerer.name(),
            "confidence": "high"
        })),
        Err(e) => {
            tracing::warn!("Answer generation via {} failed: {}", answerer.name(), e);
            Ok(json!({
                "answer": format!("Error generating answer: {}", e),
                "context": preview,
                "sources": context.sources,
                "contextLength": context.length,
                "error": e.to_string()
            }))
        }
    }
}

/// At most `max` characters of `text`, with `...` appended when cut
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct Echo;

    impl Answerer for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn answer(&self, question: &str, context: &str) -> Result<String> {
            Ok(format!("{} ({} chars)", question, context.len()))
        }
    }

    struct Broken;

    impl Answerer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn answer(&self, _question: &str, _context: &str) -> Result<String> {
            Err(Error::Answer("model unavailable".into()))
        }
    }

    fn service() -> (DocService, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("deploy.md"), "# Deploy\n\nDeploy with docker compose.").unwrap();
        fs::write(dir.path().join("auth.md"), "# Auth\n\nTokens expire after one hour.").unwrap();
        (DocService::open_dir(dir.path()).unwrap(), dir)
    }

    fn request(question: &str) -> AskRequest {
        serde_json::from_value(json!({ "question": question })).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let req = request("how?");
        assert_eq!(req.max_context_length, 4000);
        assert!(req.context_docs.is_none());
    }

    #[test]
    fn test_gather_context_from_search() {
        let (service, _dir) = service();
        let context = gather_context(&service, &request("docker deploy")).unwrap();
        assert_eq!(context.sources, vec!["deploy.md"]);
        assert!(context.text.starts_with("--- deploy.md ---\n# Deploy"));
    }

    #[test]
    fn test_gather_context_truncates() {
        let (service, _dir) = service();
        let req = AskRequest {
            question: "anything".into(),
            context_docs: Some(vec!["auth.md".into(), "missing.md".into(), "deploy.md".into()]),
            max_context_length: 10,
        };

        let context = gather_context(&service, &req).unwrap();
        assert_eq!(context.sources, vec!["auth.md"]);
        assert_eq!(context.text, "--- auth.md ---\n# Auth\n\nTo...");
    }

    #[test]
    fn test_ask_without_answerer_returns_context() {
        let (service, _dir) = service();
        let result = ask(&service, None, &request("token expire")).unwrap();
        assert_eq!(result["sources"], json!(["auth.md"]));
        assert!(result["context"].as_str().unwrap().contains("Tokens expire"));
        assert!(result.get("answer").is_none());
    }

    #[test]
    fn test_ask_with_answerer() {
        let (service, _dir) = service();
        let result = ask(&service, Some(&Echo), &request("token expire")).unwrap();
        assert!(result["answer"].as_str().unwrap().starts_with("token expire"));
        assert_eq!(result["model"], "echo");
    }

    #[test]
    fn test_ask_answerer_failure_falls_back() {
        let (service, _dir) = service();
        let result = ask(&service, Some(&Broken), &request("token expire")).unwrap();
        assert!(result["error"].as_str().unwrap().contains("model unavailable"));
        assert!(result["context"].is_string());
    }

    #[test]
    fn test_ask_nothing_found() {
        let (service, _dir) = service();
        let result = ask(&service, Some(&Echo), &request("kubernetes")).unwrap();
        assert_eq!(result["confidence"], "low");
        assert_eq!(result["sources"], json!([]));
    }

    #[test]
    fn test_command_answerer_parsing() {
        assert!(CommandAnswerer::from_command_line("   ").is_none());
        let answerer = CommandAnswerer::from_command_line("llm -m gpt-4o-mini").unwrap();
        assert_eq!(answerer.name(), "llm");
        assert_eq!(answerer.args, vec!["-m", "gpt-4o-mini"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_answerer_runs_process() {
        let answerer = CommandAnswerer::new("sh", vec!["-c".into(), "head -c 9".into()]);
        let answer = answerer.answer("q", "ctx").unwrap();
        assert_eq!(answer, "You are a");

        let failing = CommandAnswerer::new("sh", vec!["-c".into(), "cat >/dev/null; exit 3".into()]);
        assert!(matches!(failing.answer("q", "ctx"), Err(Error::Answer(_))));

        let missing = CommandAnswerer::new("docdex-no-such-command", vec![]);
        let err = missing.answer("q", "ctx").unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_answerer_echoes_large_prompt() {
        let context = "x".repeat(300_000);
        let answerer = CommandAnswerer::new("cat", vec![]).with_timeout(Duration::from_secs(30));

        let started = std::time::Instant::now();
        let answer = answerer.answer("q", &context).unwrap();
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(answer.starts_with("You are a helpful assistant"));
        assert!(answer.contains(&context));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_answerer_times_out() {
        let answerer =
            CommandAnswerer::new("sh", vec!["-c".into(), "sleep 60".into()]).with_timeout(Duration::from_secs(1));

        let started = std::time::Instant::now();
        let err = answerer.answer("q", "ctx").unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, Error::Answer(_)));
        assert!(err.to_string().contains("timed out after 1s"));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_answerer_on_blocking_pool() {
        let answerer = CommandAnswerer::new("sh", vec!["-c".into(), "head -c 3".into()]);
        let answer = tokio::task::spawn_blocking(move || answerer.answer("q", "ctx"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer, "You");
    }

    #[test]
    fn test_answer_args() {
        #[derive(clap::Parser)]
        struct Flags {
            #[command(flatten)]
            answer: AnswerArgs,
        }
        use clap::Parser;

        let flags = Flags::try_parse_from(["docdex", "--answer-command", "   "]).unwrap();
        assert!(flags.answer.answerer().is_none());

        let flags =
            Flags::try_parse_from(["docdex", "--answer-command", "llm -m mini", "--answer-timeout-secs", "7"]).unwrap();
        let answerer = flags.answer.answerer().unwrap();
        assert_eq!(answerer.name(), "llm");
        assert_eq!(answerer.args, vec!["-m", "mini"]);
        assert_eq!(answerer.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("hi", 5), "hi");
        assert_eq!(truncate_chars("", 0), "");
    }
}
