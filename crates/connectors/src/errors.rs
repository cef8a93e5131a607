use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// A value handed to a constructor violated its contract.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The connector does not provide this capability at all.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed split: {0}")]
    MalformedSplit(String),

    #[error("Data source for connector '{connector}' cannot process a {kind} split")]
    SplitMismatch {
        connector: String,
        kind: &'static str,
    },

    #[error("Unknown connector type: {0}")]
    UnknownConnectorType(String),

    #[error("Unknown connector id: {0}")]
    UnknownConnector(String),

    #[error("Registry is sealed, cannot register '{0}'")]
    RegistrySealed(String),

    #[error("Duplicate registration for '{0}'")]
    DuplicateRegistration(String),

    #[error(transparent)]
    Hive(#[from] crate::hive::errors::HiveError),

    #[error(transparent)]
    Tpch(#[from] crate::tpch::errors::TpchError),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    DataFusion(#[from] DataFusionError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConnectorError {
    /// Returns true if this error signals a missing capability rather than a
    /// failure that might succeed on retry.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ConnectorError::Unsupported(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ConnectorError::InvalidState(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        match self {
            ConnectorError::InvalidArgument(_) => true,
            ConnectorError::Hive(e) => e.is_contract_violation(),
            // Every tpch error stems from invalid handles, splits or schemas.
            ConnectorError::Tpch(_) => true,
            _ => false,
        }
    }
}

pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;

macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        crate::errors::ConnectorError::InvalidArgument(std::format!($($arg)*))
    };
}
pub(crate) use invalid_argument;

macro_rules! unsupported {
    ($($arg:tt)*) => {
        crate::errors::ConnectorError::Unsupported(std::format!($($arg)*))
    };
}
pub(crate) use unsupported;
