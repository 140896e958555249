//! In-process generation through a local inference runtime.
//!
//! Raw completion models (no chat template) tend to echo their input and
//! work best when the answer is already started for them. The backend can
//! seed the completion with a marker such as `1.` and restores it on the
//! way out, so the parser still sees the first step.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use sw_core::{BackendError, GenerationBackend, GenerationOptions};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// A model that can be asked for a completion.
pub trait InferenceRuntime {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Continue `input`. The returned text may or may not include `input`.
    fn complete(&self, input: &str, options: &GenerationOptions) -> Result<String, BackendError>;
}

/// Generation backend over an [`InferenceRuntime`].
pub struct LocalModelBackend<R> {
    runtime: R,
    completion_seed: Option<String>,
}

impl<R: InferenceRuntime> LocalModelBackend<R> {
    /// Wrap a runtime; completions are not seeded.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            completion_seed: None,
        }
    }

    /// Start every completion with `seed` (e.g. `"1."`).
    #[must_use]
    pub fn with_completion_seed(mut self, seed: impl Into<String>) -> Self {
        let seed = seed.into();
        self.completion_seed = Some(seed).filter(|s| !s.trim().is_empty());
        self
    }

    /// The wrapped runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    fn input_for(&self, prompt: &str) -> String {
        match &self.completion_seed {
            Some(seed) => format!("{}\n\n{}", prompt, seed),
            None => prompt.to_string(),
        }
    }

    /// Strip the echoed input and restore the seed.
    fn postprocess(&self, input: &str, raw: &str) -> String {
        let body = strip_echo(input, raw).trim();
        if body.is_empty() {
            return String::new();
        }

        match &self.completion_seed {
            Some(seed) if !body.starts_with(seed.as_str()) => format!("{} {}", seed, body),
            _ => body.to_string(),
        }
    }
}

/// Remove an echoed `input` from the front of `raw`.
///
/// Whitespace is ignored while matching, so an echo with collapsed or
/// re-indented lines is still recognized. Anything short of a full echo
/// leaves `raw` untouched.
fn strip_echo<'a>(input: &str, raw: &'a str) -> &'a str {
    if let Some(rest) = raw.strip_prefix(input) {
        return rest;
    }

    let mut expected = input.chars().filter(|c| !c.is_whitespace()).peekable();
    if expected.peek().is_none() {
        return raw;
    }

    for (index, ch) in raw.char_indices() {
        if ch.is_whitespace() {
            continue;
        }
        match expected.next() {
            Some(want) if want == ch => {
                if expected.peek().is_none() {
                    return &raw[index + ch.len_utf8()..];
                }
            }
            _ => return raw,
        }
    }

    raw
}

impl<R: InferenceRuntime> GenerationBackend for LocalModelBackend<R> {
    fn name(&self) -> &str {
        self.runtime.name()
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, BackendError> {
        super::warn_on_multiple_samples("local", options);

        let input = self.input_for(prompt);
        let raw = self.runtime.complete(&input, options)?;
        let text = self.postprocess(&input, &raw);

        debug!(
            runtime = self.runtime.name(),
            raw_len = raw.len(),
            text_len = text.len(),
            "local completion"
        );
        Ok(text)
    }
}

/// Runs a local inference program once per completion.
///
/// The input is written to the program's stdin and its stdout is the
/// completion. `{temperature}` and `{max_tokens}` in the arguments are
/// replaced with the sampling options of each call.
pub struct CommandRuntime {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    runtime: tokio::runtime::Runtime,
}

impl CommandRuntime {
    /// Create a runtime for `program` with argument templates `args`.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let program = program.into();
        debug_assert!(!program.is_empty(), "Program must not be empty");
        debug_assert!(timeout > Duration::ZERO, "Timeout must be positive");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::unavailable(format!("runtime error: {}", e)))?;

        Ok(Self {
            program,
            args,
            timeout,
            runtime,
        })
    }

    fn render_args(&self, options: &GenerationOptions) -> Vec<String> {
        let temperature = options.temperature.to_string();
        let max_tokens = options.output_length_max.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{temperature}", &temperature)
                    .replace("{max_tokens}", &max_tokens)
            })
            .collect()
    }

    async fn run(&self, input: &str, args: Vec<String>) -> Result<String, BackendError> {
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::unavailable(format!("Failed to start {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Programs that ignore stdin may exit before reading it.
            match stdin.write_all(input.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    return Err(BackendError::unavailable(format!(
                        "Failed to write to {}: {}",
                        self.program, e
                    )))
                }
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            BackendError::unavailable(format!("Failed to wait for {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first_line = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(BackendError::unavailable(format!(
                "{} exited with {}: {}",
                self.program, output.status, first_line
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl InferenceRuntime for CommandRuntime {
    fn name(&self) -> &str {
        &self.program
    }

    fn complete(&self, input: &str, options: &GenerationOptions) -> Result<String, BackendError> {
        let args = self.render_args(options);
        let timeout = self.timeout;

        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, self.run(input, args)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout { timeout }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes its input followed by a fixed continuation.
    struct EchoRuntime {
        continuation: &'static str,
    }

    impl InferenceRuntime for EchoRuntime {
        fn name(&self) -> &str {
            "echo"
        }

        fn complete(&self, input: &str, _options: &GenerationOptions) -> Result<String, BackendError> {
            Ok(format!("{}{}", input, self.continuation))
        }
    }

    /// Echoes its input with whitespace collapsed, as some runtimes do.
    struct NormalizingEchoRuntime {
        continuation: &'static str,
    }

    impl InferenceRuntime for NormalizingEchoRuntime {
        fn name(&self) -> &str {
            "normalizing-echo"
        }

        fn complete(&self, input: &str, _options: &GenerationOptions) -> Result<String, BackendError> {
            let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
            Ok(format!("{}{}", collapsed, self.continuation))
        }
    }

    #[test]
    fn test_normalized_echo_is_stripped() {
        let prompt = crate::prompt::PromptBuilder::build_str(
            "How do I bake bread?",
            &crate::prompt::PromptConfig::default(),
        )
        .unwrap();
        let backend = LocalModelBackend::new(NormalizingEchoRuntime {
            continuation: "\nStep 1\n1.1.\n",
        });

        let text = backend.generate(&prompt, &GenerationOptions::default()).unwrap();
        assert_eq!(text, "Step 1\n1.1.");
        assert_eq!(sw_core::parse(&text).steps_count(), 1);
    }

    #[test]
    fn test_strip_echo_leaves_other_text_alone() {
        assert_eq!(strip_echo("Question?", "Step 1\n1.1."), "Step 1\n1.1.");
        assert_eq!(strip_echo("Question? More", "Question? Mo"), "Question? Mo");
        assert_eq!(strip_echo("", "Step 1"), "Step 1");
        assert_eq!(strip_echo("a  b\n c", "a b c\n1. x"), "\n1. x");
    }

    #[test]
    fn test_echo_is_stripped() {
        let backend = LocalModelBackend::new(EchoRuntime {
            continuation: "\nStep 1\n1.1.\n",
        });
        let text = backend.generate("Question?", &GenerationOptions::default()).unwrap();
        assert_eq!(text, "Step 1\n1.1.");
    }

    #[test]
    fn test_seed_is_restored() {
        let backend = LocalModelBackend::new(EchoRuntime {
            continuation: " Open the box\n2. Read the manual",
        })
        .with_completion_seed("1.");

        let text = backend.generate("Question?", &GenerationOptions::default()).unwrap();
        assert_eq!(text, "1. Open the box\n2. Read the manual");
        assert_eq!(sw_core::parse(&text).steps_count(), 2);
    }

    #[test]
    fn test_empty_continuation_stays_empty() {
        let backend = LocalModelBackend::new(EchoRuntime { continuation: "   " })
            .with_completion_seed("1.");
        let text = backend.generate("Question?", &GenerationOptions::default()).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_render_args() {
        let runtime = CommandRuntime::new(
            "llama-cli",
            vec![
                "--temp".to_string(),
                "{temperature}".to_string(),
                "-n".to_string(),
                "{max_tokens}".to_string(),
            ],
            Duration::from_secs(1),
        )
        .unwrap();

        let options = GenerationOptions {
            temperature: 1.0,
            output_length_max: 400,
            samples_count: 1,
        };
        assert_eq!(runtime.render_args(&options), vec!["--temp", "1", "-n", "400"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runtime_reads_stdout() {
        let runtime = CommandRuntime::new(
            "sh",
            vec!["-c".to_string(), "printf 'Step 1\\n1.1.\\n'".to_string()],
            Duration::from_secs(10),
        )
        .unwrap();
        let backend = LocalModelBackend::new(runtime);

        let text = backend.generate("ignored", &GenerationOptions::default()).unwrap();
        assert_eq!(text, "Step 1\n1.1.");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runtime_passes_stdin() {
        let runtime = CommandRuntime::new("cat", Vec::new(), Duration::from_secs(10)).unwrap();
        let raw = runtime.complete("hello", &GenerationOptions::default()).unwrap();
        assert_eq!(raw, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runtime_failure_is_unavailable() {
        let runtime = CommandRuntime::new(
            "sh",
            vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()],
            Duration::from_secs(10),
        )
        .unwrap();

        match runtime.complete("x", &GenerationOptions::default()) {
            Err(BackendError::Unavailable { reason }) => assert!(reason.contains("boom")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runtime_timeout() {
        let runtime = CommandRuntime::new(
            "sleep",
            vec!["5".to_string()],
            Duration::from_millis(200),
        )
        .unwrap();

        let result = runtime.complete("x", &GenerationOptions::default());
        assert_eq!(
            result,
            Err(BackendError::Timeout {
                timeout: Duration::from_millis(200)
            })
        );
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let runtime = CommandRuntime::new(
            "definitely-not-an-inference-binary",
            Vec::new(),
            Duration::from_secs(1),
        )
        .unwrap();

        let result = runtime.complete("x", &GenerationOptions::default());
        assert!(matches!(result, Err(BackendError::Unavailable { .. })));
    }
}
