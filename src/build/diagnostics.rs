//! Failure-signature scanning of finished build logs
//!
//! Some native tools exit 0 while printing errors (partial link failures,
//! resource-compiler diagnostics). The scanner looks for known signatures in
//! a completed log. Its findings are advisory: they are reported to the
//! operator and never stop a run.

use std::path::Path;

use regex::RegexSet;

use crate::error::BuildError;
use crate::utils::terminal;

/// Whole-word signatures of failures that exit codes can miss
pub const DEFAULT_SIGNATURES: &[&str] = &[
    r"\berror\b",
    r"\bError\b",
    r"\bUnable to resolve\b",
    r"\bundefined reference\b",
];

/// A log line matching a failure signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// 1-based line number in the log
    pub line_number: usize,
    pub line: String,
}

/// Line-oriented signature matcher
#[derive(Debug, Clone)]
pub struct LogScanner {
    signatures: RegexSet,
}

impl LogScanner {
    /// Build a scanner from regex signatures
    pub fn new<I, S>(signatures: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let signatures = RegexSet::new(signatures).map_err(|e| {
            BuildError::config_with_hint(
                format!("invalid log scan pattern: {}", e),
                "Patterns under [scanner] use Rust regex syntax, e.g. '\\berror\\b'.",
            )
        })?;
        Ok(Self { signatures })
    }

    /// Scan log text already in memory
    pub fn scan_text(&self, text: &str) -> Vec<Finding> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| self.signatures.is_match(line))
            .map(|(idx, line)| Finding {
                line_number: idx + 1,
                line: line.to_string(),
            })
            .collect()
    }

    /// Scan a finished log file
    pub fn scan(&self, log_path: &Path) -> Result<Vec<Finding>, BuildError> {
        let bytes = std::fs::read(log_path).map_err(|e| BuildError::io("read log", log_path, e))?;
        Ok(self.scan_text(&String::from_utf8_lossy(&bytes)))
    }
}

impl Default for LogScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURES).expect("built-in signatures are valid regexes")
    }
}

/// Print findings as warnings
pub fn report_findings(log_path: &Path, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    terminal::print_warning(&format!(
        "{} suspicious line(s) in {}",
        findings.len(),
        log_path.display()
    ));
    for finding in findings {
        terminal::print_finding(
            &format!("{}:{}", log_path.display(), finding.line_number),
            &finding.line,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_reference_is_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = temp_dir.path().join("log.txt");
        std::fs::write(
            &log,
            "[ 50%] Linking CXX executable eglretrace\nundefined reference to foo\n[100%] Built target eglretrace\n",
        )
        .unwrap();

        let findings = LogScanner::default().scan(&log).unwrap();
        assert_eq!(
            findings,
            vec![Finding {
                line_number: 2,
                line: "undefined reference to foo".to_string(),
            }]
        );
    }

    #[test]
    fn test_clean_log_has_no_findings() {
        let log = "-- Configuring done\n-- Generating done\n[100%] Built target patrace\nInstall the project...\n";
        assert!(LogScanner::default().scan_text(log).is_empty());
    }

    #[test]
    fn test_whole_word_matching() {
        let scanner = LogScanner::default();
        assert_eq!(scanner.scan_text("main.cpp:3: error: expected ';'").len(), 1);
        assert_eq!(scanner.scan_text("Error 2").len(), 1);
        assert_eq!(scanner.scan_text("Unable to resolve target 'android-23'").len(), 1);
        assert!(scanner.scan_text("compiling errors.cpp").is_empty());
        assert!(scanner.scan_text("-- Looking for strerror_r").is_empty());
        assert!(scanner.scan_text("ERROR in caps").is_empty());
    }

    #[test]
    fn test_custom_signatures() {
        let scanner = LogScanner::new(["warning: .* elevated"]).unwrap();
        assert_eq!(scanner.scan_text("ok\nwarning: rc elevated\n").len(), 1);
        assert!(scanner.scan_text("undefined reference to foo").is_empty());
    }

    #[test]
    fn test_invalid_signature_is_config_error() {
        let err = LogScanner::new(["(unclosed"]).unwrap_err();
        assert!(matches!(err, BuildError::Config { .. }));
    }

    #[test]
    fn test_missing_log_is_io_error() {
        let err = LogScanner::default()
            .scan(Path::new("/nonexistent/buildmatrix/log.txt"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
