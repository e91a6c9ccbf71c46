use std::{
    error::Error,
    fmt::{Debug, Display},
};

use fleet_macros::EnumToString;

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumToString)]
pub enum FleetErrorTypes {
    UnknownError,
    MathError,
    ConfigError,
    ProtocolViolation,
    SolverFailure,
    BarrierTimeout,
    LifecycleError,
}

#[derive(Clone)]
pub struct FleetError {
    error_type: FleetErrorTypes,
    what: String,
}

impl FleetError {
    pub fn new(error_type: FleetErrorTypes, what: String) -> Self {
        Self { error_type, what }
    }

    pub fn detailed_error(&self) -> String {
        format!("Fleet Error of type {}: {}", self.error_type, self.what)
    }

    pub fn error_type(&self) -> FleetErrorTypes {
        self.error_type.clone()
    }

    pub fn chain(self, what: String) -> Self {
        Self {
            error_type: self.error_type,
            what: format!("{}\n↪ {}", self.what, what),
        }
    }
}

impl Display for FleetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fleet Error: {}", self.error_type)
    }
}

impl Debug for FleetError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Fleet Error of type {}: {}", self.error_type, self.what)
    }
}

impl Error for FleetError {}

pub type FleetResult<T> = Result<T, FleetError>;
