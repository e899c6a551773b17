//! Directory walking and statistics

use crate::error::TestResult;
use crate::state_test::{StateTestResults, StateTestRunner};
use fugue_evm::Fork;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

/// Aggregated test statistics
#[derive(Debug, Default)]
pub struct TestStats {
    /// Total tests seen
    pub total: usize,
    /// Tests passed
    pub passed: usize,
    /// Tests failed
    pub failed: usize,
    /// Tests skipped
    pub skipped: usize,
    /// Files that could not be parsed
    pub broken_files: Vec<(String, String)>,
    /// Total execution time
    pub duration: Duration,
    /// Failed test names with reasons
    pub failures: Vec<(String, String)>,
}

impl TestStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file's results
    pub fn add_state_results(&mut self, results: &StateTestResults) {
        self.total += results.total();
        self.passed += results.passed.len();
        self.failed += results.failed.len();
        self.skipped += results.skipped.len();
        for (name, reason) in &results.failed {
            self.failures.push((name.clone(), reason.clone()));
        }
    }

    /// Pass rate as percentage
    pub fn pass_rate(&self) -> f64 {
        let executed = self.passed + self.failed;
        if executed == 0 {
            return 100.0;
        }
        (self.passed as f64 / executed as f64) * 100.0
    }

    /// Nothing failed and every file parsed
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.broken_files.is_empty()
    }
}

impl fmt::Display for TestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========================================")?;
        writeln!(f, "Test Summary")?;
        writeln!(f, "========================================")?;
        writeln!(f, "Total:   {}", self.total)?;
        writeln!(f, "Passed:  {}", self.passed)?;
        writeln!(f, "Failed:  {}", self.failed)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        writeln!(f, "Pass Rate: {:.2}%", self.pass_rate())?;
        writeln!(f, "Duration: {:.2}s", self.duration.as_secs_f64())?;

        if !self.failures.is_empty() {
            writeln!(f, "\nFailed tests:")?;
            for (name, reason) in &self.failures {
                writeln!(f, "  - {name}: {reason}")?;
            }
        }
        if !self.broken_files.is_empty() {
            writeln!(f, "\nUnreadable files:")?;
            for (file, reason) in &self.broken_files {
                writeln!(f, "  - {file}: {reason}")?;
            }
        }
        Ok(())
    }
}

/// Runs every fixture under a path
pub struct TestRunner {
    state_runner: StateTestRunner,
    verbose: bool,
}

impl TestRunner {
    /// Runner for `fork`
    pub fn new(fork: Fork, verbose: bool) -> Self {
        Self {
            state_runner: StateTestRunner::new(fork, verbose),
            verbose,
        }
    }

    /// Run a single fixture file or every `.json` file below a directory
    pub fn run(&self, path: &Path) -> TestResult<TestStats> {
        let mut stats = TestStats::new();
        let start = Instant::now();
        tracing::info!(path = %path.display(), fork = %self.state_runner.fork(), "running state tests");

        if path.is_dir() {
            self.run_recursive(path, &mut stats)?;
        } else {
            self.run_one(path, &mut stats);
        }

        stats.duration = start.elapsed();
        Ok(stats)
    }

    fn run_recursive(&self, dir: &Path, stats: &mut TestStats) -> TestResult<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.run_recursive(&path, stats)?;
            } else if path.extension().is_some_and(|e| e == "json") {
                self.run_one(&path, stats);
            }
        }
        Ok(())
    }

    fn run_one(&self, path: &Path, stats: &mut TestStats) {
        match self.state_runner.run_file(path) {
            Ok(results) => {
                if self.verbose && !results.failed.is_empty() {
                    tracing::warn!(
                        file = %results.file,
                        passed = results.passed.len(),
                        failed = results.failed.len(),
                        skipped = results.skipped.len(),
                        "file has failures"
                    );
                }
                stats.add_state_results(&results);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "unreadable fixture");
                stats
                    .broken_files
                    .push((path.display().to_string(), e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_pass_rate() {
        let mut stats = TestStats::new();
        stats.passed = 90;
        stats.failed = 10;
        assert!((stats.pass_rate() - 90.0).abs() < 0.01);
        assert!(!stats.is_clean());
    }

    #[test]
    fn test_stats_empty() {
        let stats = TestStats::new();
        assert_eq!(stats.pass_rate(), 100.0);
        assert!(stats.is_clean());
    }

    #[test]
    fn test_summary_lists_failures() {
        let mut stats = TestStats::new();
        stats.failed = 1;
        stats
            .failures
            .push(("add_0".to_string(), "balance mismatch".to_string()));
        let summary = stats.to_string();
        assert!(summary.contains("Failed:  1"));
        assert!(summary.contains("add_0: balance mismatch"));
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let runner = TestRunner::new(Fork::Cancun, false);
        let stats = runner.run(Path::new("/definitely/not/here.json")).unwrap();
        assert_eq!(stats.broken_files.len(), 1);
        assert!(!runner.verbose);
    }
}
