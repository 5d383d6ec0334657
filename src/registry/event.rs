//! Registry change notifications

/// Emitted on every successful register / unregister
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatEvent {
    /// A format was installed
    Registered {
        name: String,
        extensions: Vec<String>,
    },
    /// A format was removed
    Unregistered { name: String },
}

impl FormatEvent {
    /// Name of the format the event is about
    pub fn name(&self) -> &str {
        match self {
            FormatEvent::Registered { name, .. } | FormatEvent::Unregistered { name } => name,
        }
    }
}
