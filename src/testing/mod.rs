//! Test-suite execution for repositories.
//!
//! [`TestOperations`] is what the core calls; [`PytestRunner`] runs the suites
//! through `poetry run pytest`.

use crate::error::{MprError, Result, TestError, ToolError};
use crate::pool;
use crate::process;
use crate::workspace::RepositoryDescriptor;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// pytest exit status meaning no tests were collected
const PYTEST_NO_TESTS: i32 = 5;

/// Which suite to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestSuite {
    /// Fast per-repository tests
    Unit,
    /// Cross-repository integration tests
    Integration,
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestSuite::Unit => write!(f, "unit"),
            TestSuite::Integration => write!(f, "integration"),
        }
    }
}

/// Outcome of one suite run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// Every test passed
    Passed,
    /// At least one test failed
    Failed {
        /// Captured output
        output: String,
    },
    /// The repository has no tests for this suite
    NoneFound,
}

impl TestOutcome {
    /// Whether this outcome blocks a release
    pub fn is_failure(&self) -> bool {
        matches!(self, TestOutcome::Failed { .. })
    }
}

/// Runs a repository's test suite
pub trait TestOperations: Send + Sync {
    /// Run `suite` for `repo`. A timeout is an error, not an outcome.
    fn run(
        &self,
        repo: &RepositoryDescriptor,
        suite: TestSuite,
    ) -> impl Future<Output = Result<TestOutcome>> + Send;
}

/// Runs pytest inside each repository's Poetry environment
#[derive(Debug, Clone)]
pub struct PytestRunner {
    timeout: Duration,
}

impl Default for PytestRunner {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
        }
    }
}

impl PytestRunner {
    /// Create a runner with the default 300s budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-run budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Budget for one suite run
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl TestOperations for PytestRunner {
    async fn run(&self, repo: &RepositoryDescriptor, suite: TestSuite) -> Result<TestOutcome> {
        let args = match suite {
            TestSuite::Unit => vec!["run", "pytest", "-x", "--tb=short"],
            TestSuite::Integration => vec!["run", "pytest", "-m", "integration", "--tb=short"],
        };

        log::info!("Running {} tests for '{}'", suite, repo.name);
        let output = match process::run("poetry", &args, &repo.path, self.timeout).await {
            Ok(output) => output,
            Err(MprError::Tool(ToolError::NotFound { program })) => {
                log::warn!("'{}' not available, skipping tests for '{}'", program, repo.name);
                return Ok(TestOutcome::NoneFound);
            }
            Err(MprError::Tool(ToolError::Timeout { .. })) => {
                return Err(TestError::Timeout {
                    repository: repo.name.clone(),
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        Ok(match output.code {
            Some(0) => TestOutcome::Passed,
            Some(PYTEST_NO_TESTS) => {
                log::info!("No {} tests found for '{}'", suite, repo.name);
                TestOutcome::NoneFound
            }
            _ => TestOutcome::Failed {
                output: output.combined(),
            },
        })
    }
}

/// Run a suite for several repositories in a bounded pool.
///
/// Results are returned in input order, one per repository.
pub async fn run_batch<T>(
    tests: Arc<T>,
    repos: Vec<RepositoryDescriptor>,
    suite: TestSuite,
    jobs: usize,
) -> Result<Vec<(String, Result<TestOutcome>)>>
where
    T: TestOperations + 'static,
{
    pool::run_bounded(repos, jobs, move |repo| {
        let tests = Arc::clone(&tests);
        async move {
            let outcome = tests.run(&repo, suite).await;
            (repo.name, outcome)
        }
    })
    .await
}

/// Names of repositories whose batch run failed or errored
pub fn failed_repositories(results: &[(String, Result<TestOutcome>)]) -> Vec<String> {
    results
        .iter()
        .filter(|(_, outcome)| match outcome {
            Ok(outcome) => outcome.is_failure(),
            Err(_) => true,
        })
        .map(|(name, _)| name.clone())
        .collect()
}
