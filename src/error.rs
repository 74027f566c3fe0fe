use crate::engine::JobName;
use crate::loader::ContainerFormat;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse classification used by callers to pick a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fetching the bytes failed
    Io,
    /// Bytes arrived but match no accepted container
    Parse,
    /// Decoded data is internally inconsistent
    DataShape,
    /// The compute channel could not run the job
    Channel,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error while fetching {url}: {message}")]
    Io { url: String, message: String },

    #[error("could not parse {url} as {}: {message}", format_list(.attempted))]
    Parse {
        url: String,
        attempted: Vec<ContainerFormat>,
        message: String,
    },

    #[error("data error in {context}: {message}")]
    DataShape { context: String, message: String },

    #[error("compute channel has been terminated")]
    Terminated,

    #[error("job {job} failed inside its worker: {message}")]
    JobPanicked { job: JobName, message: String },
}

impl PipelineError {
    pub fn io(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Io {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(url: impl Into<String>, format: ContainerFormat, message: impl ToString) -> Self {
        Self::Parse {
            url: url.into(),
            attempted: vec![format],
            message: message.to_string(),
        }
    }

    pub fn data(context: impl Into<String>, message: impl ToString) -> Self {
        Self::DataShape {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::DataShape { .. } => ErrorKind::DataShape,
            Self::Terminated | Self::JobPanicked { .. } => ErrorKind::Channel,
        }
    }
}

fn format_list(formats: &[ContainerFormat]) -> String {
    formats
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(" or ")
}
