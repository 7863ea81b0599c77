use tokio::runtime::TryCurrentError;

#[derive(Debug)]
pub enum LeaseError {
    Disposed,
    NoRuntime,
    Acquire(anyhow::Error),
    Release(anyhow::Error),
}

impl std::error::Error for LeaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LeaseError::Acquire(err) | LeaseError::Release(err) => Some(&**err),
            _ => None,
        }
    }
}

impl std::fmt::Display for LeaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaseError::Disposed => "License controller disposed".fmt(f),
            LeaseError::NoRuntime => "License controller requires a tokio runtime".fmt(f),
            LeaseError::Acquire(err) => write!(f, "License acquire failed: {}", err),
            LeaseError::Release(err) => write!(f, "License release failed: {}", err),
        }
    }
}

impl From<TryCurrentError> for LeaseError {
    fn from(_value: TryCurrentError) -> Self {
        LeaseError::NoRuntime
    }
}
