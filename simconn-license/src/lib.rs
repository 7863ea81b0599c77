pub mod license;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type ConnResult<T> = std::result::Result<T, Error>;
