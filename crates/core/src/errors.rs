use thiserror::Error;

/// Failure reported by a store collaborator. The pipeline converts any of
/// these into the `error` chat result; it never retries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{store} store unavailable: {message}")]
    Unavailable { store: &'static str, message: String },
    #[error("{store} store returned undecodable data: {message}")]
    Decode { store: &'static str, message: String },
}

impl StoreError {
    pub fn unavailable(store: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable { store, message: message.into() }
    }

    pub fn store(&self) -> &'static str {
        match self {
            Self::Unavailable { store, .. } | Self::Decode { store, .. } => store,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Não consegui processar a requisição. Verifique os dados enviados.",
            Self::ServiceUnavailable { .. } => {
                "O serviço está temporariamente indisponível. Tente novamente em instantes."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::InvalidInput(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Store(error) => Self::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
        }
    }
}
