use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Configuration for the tracing subscriber.
///
/// `RUST_LOG` takes precedence over [`TracingConfig::level`] when set.
///
/// # Examples
///
/// ```
/// use server_fixture::observability::TracingConfig;
///
/// // safe to call from every test, only the first call installs a subscriber
/// TracingConfig::new().for_tests().try_init();
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output logs as JSON.
    pub json: bool,
    /// The minimum log level.
    pub level: Level,
    /// Include the target (module path) in logs.
    pub with_target: bool,
    /// Include the source file in logs.
    pub with_file: bool,
    /// Include line numbers in logs.
    pub with_line_number: bool,
    /// Write through the test harness so output is captured per test.
    pub test_writer: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: Level::INFO,
            with_target: true,
            with_file: false,
            with_line_number: false,
            test_writer: false,
        }
    }
}

impl TracingConfig {
    /// Creates a new tracing configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables JSON output format.
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Sets the minimum log level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Configures whether to include the target in logs.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Configures whether to include file names in logs.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// Configures whether to include line numbers in logs.
    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Routes output through libtest's capture and lowers the level to DEBUG.
    pub fn for_tests(mut self) -> Self {
        self.test_writer = true;
        self.level = Level::DEBUG;
        self
    }

    /// Initializes the global subscriber, panicking if one is already set.
    pub fn init(self) {
        if !self.try_init() {
            panic!("a global tracing subscriber has already been installed");
        }
    }

    /// Initializes the global subscriber unless one is already set.
    ///
    /// Returns whether this call installed it.
    pub fn try_init(self) -> bool {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let builder = fmt()
            .with_env_filter(filter)
            .with_target(self.with_target)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number);

        match (self.json, self.test_writer) {
            (true, true) => builder.json().with_test_writer().try_init().is_ok(),
            (true, false) => builder.json().try_init().is_ok(),
            (false, true) => builder.with_test_writer().try_init().is_ok(),
            (false, false) => builder.try_init().is_ok(),
        }
    }
}
