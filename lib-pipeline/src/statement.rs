/// Shell statements run on behalf of the tasks.
use std::path::Path;
use std::process::{Command, Stdio};

use slog::Logger;

use crate::errors::*;

/// Substitute `{{key}}` placeholders in `template`.
///
/// Fails if the template names a placeholder missing from `values`. Substituted values are
/// inserted verbatim and never scanned for placeholders themselves.
pub fn render(template: &str, values: &[(&str, &str)]) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = match tail.find("}}") {
            Some(end) => end + 2,
            None => bail!("Unterminated placeholder {} in statement", tail),
        };
        let key = &tail[2..end - 2];
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => result.push_str(value),
            None => bail!("Unresolved placeholder {} in statement", &tail[..end]),
        }
        rest = &tail[end..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Quote `s` for use as a single shell word.
pub fn quote(s: &str) -> String {
    shlex::try_quote(s)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Join the lines of a multi-line statement into a single line.
pub fn clean(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// A shell statement together with the resources it asks for.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// The command line, already cleaned.
    pub text: String,
    /// Number of threads the statement uses.
    pub threads: usize,
    /// Memory the statement needs, e.g., `12G`.
    pub memory: Option<String>,
    /// Conda environment to activate before running.
    pub condaenv: Option<String>,
}

impl Statement {
    pub fn new(text: &str) -> Self {
        Statement {
            text: clean(text),
            threads: 1,
            memory: None,
            condaenv: None,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn memory(mut self, memory: &str) -> Self {
        self.memory = Some(memory.to_string());
        self
    }

    pub fn condaenv(mut self, env: &str) -> Self {
        self.condaenv = Some(env.to_string());
        self
    }

    /// The full command line passed to bash.
    pub fn script(&self) -> String {
        let mut script = String::from("set -o pipefail; ");
        if let Some(ref env) = self.condaenv {
            script.push_str(&format!(
                "eval \"$(conda shell.bash hook)\" && conda activate {} && ",
                quote(env)
            ));
        }
        script.push_str(&self.text);
        script
    }

    /// Run with bash in `workdir`; a non-zero exit status is an error.
    pub fn run(&self, logger: &Logger, workdir: &Path) -> Result<()> {
        info!(
            logger,
            "Running statement (threads: {}, memory: {})",
            self.threads,
            self.memory.as_ref().map(|s| s.as_str()).unwrap_or("default")
        );
        debug!(logger, "{}", self.text);

        let output = Command::new("bash")
            .arg("-c")
            .arg(self.script())
            .current_dir(workdir)
            .stdin(Stdio::null())
            .output()
            .chain_err(|| "Could not start bash")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            for line in stderr.lines() {
                error!(logger, "{}", line);
            }
            bail!("Statement failed ({}): {}", output.status, self.text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempdir::TempDir;

    fn logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[test]
    fn test_render() {
        let text = render("samtools index -b {{infile}} {{outfile}}", &[
            ("infile", "a.bam"),
            ("outfile", "a.bam.bai"),
        ])
        .unwrap();
        assert_eq!(text, "samtools index -b a.bam a.bam.bai");

        let err = render("cat {{infile}} {{missing}}", &[("infile", "x")]).unwrap_err();
        assert!(format!("{}", err).contains("{{missing}}"));
    }

    #[test]
    fn test_render_keeps_braces_in_values() {
        let text = render("echo {{extra}} {{outfile}}", &[
            ("extra", "--label '{{x}}'"),
            ("outfile", "out.txt"),
        ])
        .unwrap();
        assert_eq!(text, "echo --label '{{x}}' out.txt");

        assert!(render("echo {{outfile", &[("outfile", "out.txt")]).is_err());
    }

    #[test]
    fn test_clean() {
        let text = "tmp=`mktemp` &&\n        STAR\n          --runMode alignReads\n\n    ";
        assert_eq!(clean(text), "tmp=`mktemp` && STAR --runMode alignReads");
    }

    #[test]
    fn test_quote() {
        for word in &["plain.bam", "with space.bam", "it's"] {
            assert_eq!(shlex::split(&quote(word)).unwrap(), vec![word.to_string()]);
        }
    }

    #[test]
    fn test_script() {
        let statement = Statement::new("echo 1").threads(3).condaenv("cgat-env");
        assert_eq!(statement.threads, 3);
        assert!(statement.script().starts_with("set -o pipefail; eval"));
        assert!(statement.script().contains("conda activate"));
        assert!(statement.script().ends_with("&& echo 1"));
    }

    #[test]
    fn test_run() {
        let tmp_dir = TempDir::new("mrnaseq_statement").unwrap();
        Statement::new("echo hello > out.txt")
            .run(&logger(), tmp_dir.path())
            .unwrap();
        assert!(tmp_dir.path().join("out.txt").exists());

        // Failures inside a pipe are not masked.
        assert!(Statement::new("false | cat")
            .run(&logger(), tmp_dir.path())
            .is_err());
    }
}
