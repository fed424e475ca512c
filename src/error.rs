use std::fmt;

use crate::path::Path;

/*  Every fatal condition the engine can raise.  User/config mistakes,
    action failures (wrapped with the dependency chain that led to them)
    and internal invariant violations all live in the same enum because
    callers generally only need to print the thing and stop, not match on
    it kind by kind. */
#[derive(Debug, Clone)]
pub enum BuildError
{
    NoRuleFound(Path),
    MultipleRulesForTarget(Path),
    FileUnavailable(Path),
    TargetsNotGenerated(Vec<Path>),
    Cycle(Vec<Path>),
    MemoCycle(String),
    ActionFailed
    {
        dep_path: Vec<Path>,
        message: String,
    },
    TraceCorrupt(String),
    Io(String),
    Internal(String),
}

impl fmt::Display for BuildError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            BuildError::NoRuleFound(path) =>
                write!(formatter, "No rule found to build: {}", path),

            BuildError::MultipleRulesForTarget(path) =>
                write!(formatter, "Multiple rules claim to build target: {}", path),

            BuildError::FileUnavailable(path) =>
                write!(formatter, "File is neither a registered target nor present on disk: {}", path),

            BuildError::TargetsNotGenerated(paths) =>
            {
                write!(formatter, "Rule claimed success but did not produce:")?;
                for path in paths
                {
                    write!(formatter, " {}", path)?;
                }
                Ok(())
            },

            BuildError::Cycle(chain) =>
            {
                write!(formatter, "Dependency cycle:")?;
                for path in chain
                {
                    write!(formatter, " {} ->", path)?;
                }
                write!(formatter, " {}", chain.first().map(|p| p.to_string()).unwrap_or_default())
            },

            BuildError::MemoCycle(name) =>
                write!(formatter, "Memo cycle evaluating: {}", name),

            BuildError::ActionFailed{dep_path, message} =>
            {
                write!(formatter, "{}", message)?;
                for path in dep_path
                {
                    write!(formatter, "\n  needed by: {}", path)?;
                }
                Ok(())
            },

            BuildError::TraceCorrupt(path) =>
                write!(formatter, "Trace file is corrupt and cannot be parsed: {}", path),

            BuildError::Io(message) =>
                write!(formatter, "I/O error: {}", message),

            BuildError::Internal(message) =>
                write!(formatter, "Internal invariant violated (this is a defect in the engine): {}", message),
        }
    }
}

impl std::error::Error for BuildError {}

/*  The error an Action's own execution raises.  Opaque to the engine
    beyond its Display text: the engine only ever wraps this into
    BuildError::ActionFailed, it never inspects it further. */
#[derive(Debug)]
pub struct ActionError(pub String);

impl fmt::Display for ActionError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        write!(formatter, "{}", self.0)
    }
}

impl std::error::Error for ActionError {}
