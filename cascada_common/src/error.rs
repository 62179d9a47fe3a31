use ::core::fmt::Display;

pub type Result<T> = std::result::Result<T, CascadaError>;

/// Kinds of failure a Cascada client operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadaErrorType {
    /// A request body could not be built.
    JsonInternal,
    /// A required field is missing from a coordinator response, or has the wrong shape.
    MissingInfo,
    /// The coordinator referenced a variable the node never bound.
    UnregisteredVariable,
    /// A scalar type that cannot be decoded or stored.
    InvalidType,
    /// The operation is not valid in the current session state, or the node is unknown.
    InvalidState,
    /// The HTTP exchange itself failed.
    Transport,
    FailToLoadConfig,
    /// Non-zero status code reported by the coordinator, passed through untouched.
    Coordinator(i64),
}

impl CascadaErrorType {
    /// Integer status of this kind of error.
    /// Local failures are negative so they never collide with coordinator codes.
    pub fn status_code(&self) -> i64 {
        match self {
            Self::JsonInternal => -1,
            Self::MissingInfo => -2,
            Self::UnregisteredVariable => -4,
            Self::InvalidType => -5,
            Self::InvalidState => -6,
            Self::Transport => -7,
            Self::FailToLoadConfig => -8,
            Self::Coordinator(code) => *code,
        }
    }

    /// Whether the error was raised locally rather than reported by the coordinator.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Coordinator(_))
    }
}

impl Display for CascadaErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JsonInternal => write!(f, "Json internal error"),
            Self::MissingInfo => write!(f, "Missing info"),
            Self::UnregisteredVariable => write!(f, "Unregistered variable"),
            Self::InvalidType => write!(f, "Invalid type"),
            Self::InvalidState => write!(f, "Invalid state"),
            Self::Transport => write!(f, "Transport error"),
            Self::FailToLoadConfig => write!(f, "Fail to load config"),
            Self::Coordinator(code) => write!(f, "Coordinator status {}", code),
        }
    }
}

#[derive(Debug)]
pub struct CascadaError {
    error_type: CascadaErrorType,
    error: anyhow::Error,
}

macro_rules! define_constructor {
    ($name: ident, $error_type: expr) => {
        pub fn $name<E: Into<anyhow::Error>>(error: E) -> Self {
            Self {
                error_type: $error_type,
                error: error.into(),
            }
        }
    };
}

impl CascadaError {
    define_constructor!(json_internal, CascadaErrorType::JsonInternal);
    define_constructor!(missing_info, CascadaErrorType::MissingInfo);
    define_constructor!(unregistered_variable, CascadaErrorType::UnregisteredVariable);
    define_constructor!(invalid_type, CascadaErrorType::InvalidType);
    define_constructor!(invalid_state, CascadaErrorType::InvalidState);
    define_constructor!(transport, CascadaErrorType::Transport);
    define_constructor!(fail_to_load_config, CascadaErrorType::FailToLoadConfig);

    /// Error carrying a non-zero `code` returned by the coordinator.
    pub fn coordinator(code: i64) -> Self {
        Self {
            error_type: CascadaErrorType::Coordinator(code),
            error: anyhow::anyhow!("coordinator replied with code {}", code),
        }
    }

    pub fn get_error_type(&self) -> CascadaErrorType {
        self.error_type
    }

    pub fn status_code(&self) -> i64 {
        self.error_type.status_code()
    }
}

impl Display for CascadaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error)
    }
}

impl std::error::Error for CascadaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl<T> From<CascadaError> for Result<T> {
    fn from(val: CascadaError) -> Self {
        Result::Err(val)
    }
}
