/// Where a log line comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    /// "engine", "reconcile", "controller", "web", ...
    pub component: String,
    pub controller_id: Option<String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            controller_id: None,
        }
    }
}

// Component and controller are emitted as separate tracing fields
macro_rules! emit {
    ($level:ident, $ctx:expr, $message:expr) => {{
        let ctx: &LogContext = &$ctx;
        let component = ctx.component.as_str();
        match ctx.controller_id.as_deref() {
            Some(controller) => tracing::$level!(component, controller, "{}", $message),
            None => tracing::$level!(component, "{}", $message),
        }
    }};
}

/// Component logger used throughout the crate
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: LogContext,
}

impl StructuredLogger {
    pub fn context(&self) -> &LogContext {
        &self.context
    }

    /// Same component, tagged with a controller instance
    pub fn for_controller(&self, controller_id: &str) -> Self {
        Self {
            context: LogContext {
                controller_id: Some(controller_id.to_string()),
                ..self.context.clone()
            },
        }
    }

    pub fn trace(&self, message: &str) {
        emit!(trace, self.context, message);
    }

    pub fn debug(&self, message: &str) {
        emit!(debug, self.context, message);
    }

    pub fn info(&self, message: &str) {
        emit!(info, self.context, message);
    }

    pub fn warn(&self, message: &str) {
        emit!(warn, self.context, message);
    }

    pub fn error(&self, message: &str) {
        emit!(error, self.context, message);
    }
}

pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger {
        context: LogContext::new(component),
    }
}
