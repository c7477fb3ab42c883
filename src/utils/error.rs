use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepresentError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Malformed input in {source_name}: {message}")]
    InputFormatError {
        source_name: String,
        message: String,
    },

    #[error("CRS mismatch: dataset uses '{dataset}', regions use '{regions}'")]
    CrsMismatch { dataset: String, regions: String },

    #[error("Clustering failed for region '{region}': {message}")]
    ClusteringError { region: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Processing,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 依嚴重程度決定程序結束碼
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Low => 0,
            Self::Medium => 2,
            Self::High => 1,
            Self::Critical => 3,
        }
    }
}

impl RepresentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::CsvError(_) | Self::InputFormatError { .. } | Self::CrsMismatch { .. } => {
                ErrorCategory::Input
            }
            Self::ClusteringError { .. }
            | Self::ProcessingError { .. }
            | Self::ValidationError { .. }
            | Self::SerializationError(_) => ErrorCategory::Processing,
            Self::ZipError(_) => ErrorCategory::Output,
            Self::IoError(_) | Self::TaskError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Processing => match self {
                // 資料本身的問題，調整參數後可重試
                Self::ClusteringError { .. } | Self::ValidationError { .. } => {
                    ErrorSeverity::Medium
                }
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Check the configuration file syntax and required sections"
            }
            Self::InvalidConfigValueError { .. } => {
                "Correct the highlighted configuration value and run again"
            }
            Self::CsvError(_) | Self::InputFormatError { .. } => {
                "Check column names and numeric values in the input files"
            }
            Self::CrsMismatch { .. } => {
                "Reproject the region shapes to the dataset CRS before running"
            }
            Self::ClusteringError { .. } => {
                "Lower the number of time series per region or check the region's cells"
            }
            Self::ValidationError { .. } => "Check the time series length and period settings",
            Self::ProcessingError { .. } | Self::SerializationError(_) => {
                "Run with --verbose to inspect the failing step"
            }
            Self::ZipError(_) => "Disable compression or check free disk space",
            Self::IoError(_) => "Check that the paths exist and are readable/writable",
            Self::TaskError(_) => "Reduce the number of workers and run again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not read the input data: {}", self),
            ErrorCategory::Processing => format!("Representation failed: {}", self),
            ErrorCategory::Output => format!("Could not write the results: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn input(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputFormatError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepresentError>;
