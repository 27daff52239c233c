use crate::config::LoggingConfig;
use regex::Regex;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Compile the configured redaction patterns, skipping invalid ones.
fn compile_patterns(config: &LoggingConfig) -> Vec<(Regex, String)> {
    let mut patterns = Vec::new();
    if !config.redaction.enabled {
        return patterns;
    }
    for p in &config.redaction.patterns {
        match Regex::new(&p.regex) {
            Ok(re) => patterns.push((re, p.placeholder.clone())),
            Err(e) => eprintln!("warning: ignoring redaction pattern '{}': {}", p.name, e),
        }
    }
    patterns
}

fn redact(patterns: &[(Regex, String)], text: &str) -> String {
    let mut redacted = text.to_string();
    for (re, replacement) in patterns {
        redacted = re.replace_all(&redacted, replacement.as_str()).to_string();
    }
    redacted
}

struct RedactingWriter<W> {
    inner: W,
    patterns: Vec<(Regex, String)>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&self.patterns, &s).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter {
    patterns: Vec<(Regex, String)>,
}

impl<'a> fmt::MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&self) -> Self::Writer {
        RedactingWriter {
            inner: io::stderr(),
            patterns: self.patterns.clone(),
        }
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// reserved for command output. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.levels.filter_level()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let show_file = config.format.location.show_file;
    let show_line = config.format.location.show_line;
    let make_writer = RedactingMakeWriter {
        patterns: compile_patterns(config),
    };

    // Use Layer::boxed() to unify the types of the branches
    let fmt_layer = match (config.format.json, config.format.show_time) {
        (true, _) => fmt::layer()
            .json()
            .with_writer(make_writer)
            .with_file(show_file)
            .with_line_number(show_line)
            .boxed(),
        (false, false) => fmt::layer()
            .with_writer(make_writer)
            .with_target(show_file)
            .with_file(show_file)
            .with_line_number(show_line)
            .without_time()
            .boxed(),
        (false, true) => fmt::layer()
            .with_writer(make_writer)
            .with_target(show_file)
            .with_file(show_file)
            .with_line_number(show_line)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RedactionConfig, RedactionPattern};

    fn config_with(patterns: Vec<RedactionPattern>, enabled: bool) -> LoggingConfig {
        LoggingConfig {
            redaction: RedactionConfig { enabled, patterns },
            ..LoggingConfig::default()
        }
    }

    fn password_pattern() -> RedactionPattern {
        RedactionPattern {
            name: "connection_password".into(),
            regex: r#"(?i)(password|pwd)\s*=\s*[^;"'\s]+"#.into(),
            placeholder: "$1=[REDACTED]".into(),
        }
    }

    #[test]
    fn test_redacts_connection_string_password() {
        let patterns = compile_patterns(&config_with(vec![password_pattern()], true));
        let out = redact(&patterns, "Server=db01;User Id=sa;Password=hunter2;Encrypt=true");
        assert_eq!(out, "Server=db01;User Id=sa;Password=[REDACTED];Encrypt=true");
    }

    #[test]
    fn test_disabled_redaction_passes_through() {
        let patterns = compile_patterns(&config_with(vec![password_pattern()], false));
        assert!(patterns.is_empty());
        assert_eq!(redact(&patterns, "pwd=secret"), "pwd=secret");
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let bad = RedactionPattern {
            name: "broken".into(),
            regex: "(".into(),
            placeholder: "x".into(),
        };
        let patterns = compile_patterns(&config_with(vec![bad, password_pattern()], true));
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn test_writer_redacts_bytes() {
        use std::io::Write;
        let patterns = compile_patterns(&config_with(vec![password_pattern()], true));
        let mut w = RedactingWriter {
            inner: Vec::new(),
            patterns,
        };
        let input = b"PWD=abc123 connecting";
        assert_eq!(w.write(input).unwrap(), input.len());
        assert_eq!(String::from_utf8(w.inner).unwrap(), "PWD=[REDACTED] connecting");
    }
}
