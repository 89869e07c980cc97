//! Fixture runner and statistics

use crate::error::{TestError, TestResult};
use crate::types::{Expected, Fixture, FixtureFile};
use std::path::Path;
use std::time::{Duration, Instant};
use tessera_vm::{Engine, EngineConfig, ExecuteScriptsResult, ExecutionInit, MemorySnapshot, VmState};
use tracing::{info, warn};

/// Results of one fixture file
#[derive(Debug)]
pub struct FixtureResults {
    /// File path
    pub file: String,
    /// Passed fixtures
    pub passed: Vec<String>,
    /// Failed fixtures (name, reason)
    pub failed: Vec<(String, String)>,
}

impl FixtureResults {
    /// Create new results
    pub fn new(file: String) -> Self {
        Self {
            file,
            passed: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Fixtures run
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// Aggregated statistics across files
#[derive(Debug, Default)]
pub struct TestStats {
    /// Total fixtures executed
    pub total: usize,
    /// Fixtures passed
    pub passed: usize,
    /// Fixtures failed
    pub failed: usize,
    /// Total execution time
    pub duration: Duration,
    /// Failed fixture names with reasons
    pub failures: Vec<(String, String)>,
}

impl TestStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the results of one file
    pub fn add_results(&mut self, results: &FixtureResults) {
        self.total += results.total();
        self.passed += results.passed.len();
        self.failed += results.failed.len();
        for (name, reason) in &results.failed {
            self.failures.push((format!("{}::{}", results.file, name), reason.clone()));
        }
    }

    /// Pass rate as percentage
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.passed as f64 / self.total as f64) * 100.0
    }

    /// Log a summary
    pub fn log_summary(&self) {
        info!(
            total = self.total,
            passed = self.passed,
            failed = self.failed,
            pass_rate = format!("{:.2}%", self.pass_rate()),
            duration_ms = self.duration.as_millis() as u64,
            "fixture summary"
        );
        for (name, reason) in &self.failures {
            warn!("  - {}: {}", name, reason);
        }
    }
}

/// Executes fixtures against a fresh in-memory snapshot each
pub struct FixtureRunner {
    /// Log every fixture
    verbose: bool,
}

impl FixtureRunner {
    /// Create new fixture runner
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run all fixtures in a file
    pub fn run_file(&self, path: &Path) -> TestResult<FixtureResults> {
        let content = std::fs::read_to_string(path)?;
        let fixtures: FixtureFile = serde_json::from_str(&content)?;

        let mut results = FixtureResults::new(path.to_string_lossy().to_string());
        for (name, fixture) in fixtures {
            match self.run_fixture(&name, &fixture) {
                Ok(()) => {
                    if self.verbose {
                        info!("PASS: {}", name);
                    }
                    results.passed.push(name);
                }
                Err(e) => {
                    if self.verbose {
                        warn!("FAIL: {} - {}", name, e);
                    }
                    results.failed.push((name, e.to_string()));
                }
            }
        }
        Ok(results)
    }

    /// Run every `.json` file under `dir`, recursively, in path order
    pub fn run_dir(&self, dir: &Path) -> TestResult<TestStats> {
        let mut stats = TestStats::new();
        let start = Instant::now();
        if self.verbose {
            info!("Running fixtures from: {:?}", dir);
        }
        self.run_dir_recursive(dir, &mut stats)?;
        stats.duration = start.elapsed();
        Ok(stats)
    }

    fn run_dir_recursive(&self, dir: &Path, stats: &mut TestStats) -> TestResult<()> {
        if !dir.exists() {
            return Err(TestError::Parse(format!("fixture directory not found: {:?}", dir)));
        }

        let mut paths = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.run_dir_recursive(&path, stats)?;
            } else if path.extension().is_some_and(|e| e == "json") {
                let results = self.run_file(&path)?;
                stats.add_results(&results);
            }
        }
        Ok(())
    }

    /// Run a single fixture
    pub fn run_fixture(&self, name: &str, fixture: &Fixture) -> TestResult<()> {
        let mut config = EngineConfig::default();
        if let Some(limits) = &fixture.limits {
            config.limits = limits.clone();
        }
        if let Some(free_gas) = fixture.free_gas {
            config.free_gas = free_gas;
        }
        config
            .validate()
            .map_err(|e| TestError::Parse(format!("{}: {}", name, e)))?;

        let init = ExecutionInit::new(fixture.trigger.unwrap_or(tessera_vm::TriggerType::Application));
        let mut snapshot = MemorySnapshot::new();
        let result = Engine::new(config).execute(&fixture.to_scripts(), &mut snapshot, &init, fixture.gas);

        check_result(name, &fixture.expected, &result)
    }
}

/// Check execution result against expected values
fn check_result(name: &str, expected: &Expected, result: &ExecuteScriptsResult) -> TestResult<()> {
    let state = match result.state {
        VmState::Halt => "HALT",
        VmState::Fault => "FAULT",
    };
    if !expected.state.eq_ignore_ascii_case(state) {
        return Err(TestError::Assertion(format!(
            "{}: state mismatch: expected {}, got {} ({})",
            name,
            expected.state,
            state,
            result.error_message.as_deref().unwrap_or("no error")
        )));
    }

    if let Some(expected_gas) = expected.gas_consumed {
        if result.gas_consumed != expected_gas {
            return Err(TestError::Assertion(format!(
                "{}: gas consumed mismatch: expected {}, got {}",
                name, expected_gas, result.gas_consumed
            )));
        }
    }

    if let Some(expected_cost) = expected.gas_cost {
        if result.gas_cost != expected_cost {
            return Err(TestError::Assertion(format!(
                "{}: gas cost mismatch: expected {}, got {}",
                name, expected_cost, result.gas_cost
            )));
        }
    }

    if let Some(expected_stack) = &expected.stack {
        let actual = serde_json::to_value(&result.stack)?;
        if &actual != expected_stack {
            return Err(TestError::Assertion(format!(
                "{}: stack mismatch: expected {}, got {}",
                name, expected_stack, actual
            )));
        }
    }

    if let Some(fragment) = &expected.error_contains {
        let message = result.error_message.as_deref().unwrap_or_default();
        if !message.contains(fragment.as_str()) {
            return Err(TestError::Assertion(format!(
                "{}: error message {:?} does not contain {:?}",
                name, message, fragment
            )));
        }
    }

    Ok(())
}
