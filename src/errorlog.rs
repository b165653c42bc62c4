/// User-facing error log - collects warnings and errors raised during one
/// render so the host UI can show them after the fact.
/// Cleared at the start of every render.
#[derive(Debug, Default)]
pub struct ErrorLog {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ErrorLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all recorded entries
    pub fn clear(&mut self) {
        self.warnings.clear();
        self.errors.clear();
    }

    /// Record a warning and mirror it to the log output
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Record an error and mirror it to the log output
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.errors.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}
