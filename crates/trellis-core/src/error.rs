use thiserror::Error;

use crate::target::{Handle, TargetError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A child value could not be turned into a descriptor.
    #[error("child {index} is neither a descriptor nor text-coercible (found {found})")]
    MalformedChild { index: usize, found: &'static str },

    /// State change requested for an instance whose tree position is gone.
    #[error("state update for `{component}` targets an instance that is no longer mounted")]
    DetachedInstance { component: &'static str },

    #[error("render of `{component}` failed: {message}")]
    Render {
        component: &'static str,
        message: String,
    },

    /// The render target rejected a mutation. The in-progress tree is dropped.
    #[error("render target failure: {0}")]
    Target(#[from] TargetError),

    /// An earlier commit into `container` failed after changing the target,
    /// so its committed tree no longer describes what the target shows.
    #[error("container {container:?} was left half-committed; reset it before rendering again")]
    Poisoned { container: Handle },

    #[error("work tree is inconsistent: {0}")]
    Corrupt(&'static str),
}

impl Error {
    pub fn render(component: &'static str, message: impl Into<String>) -> Self {
        Error::Render {
            component,
            message: message.into(),
        }
    }
}
