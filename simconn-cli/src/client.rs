use std::path::{Path, PathBuf};

use crate::routine::{HeatExchanger, RoutineError};

pub const SIMULATOR_VERSION: &str = "heat-exchanger 1.0";

#[derive(Debug)]
pub enum ClientError {
    ModelNotFound(PathBuf),
    NotAFile(PathBuf),
    Io(std::io::Error),
    Connection(RoutineError),
}

impl std::error::Error for ClientError {}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::ModelNotFound(path) => {
                write!(f, "Model file not found: {}", path.display())
            }
            ClientError::NotAFile(path) => write!(f, "Model is not a file: {}", path.display()),
            ClientError::Io(err) => write!(f, "Model file unreadable: {}", err),
            ClientError::Connection(err) => write!(f, "Connection test failed: {}", err),
        }
    }
}

/// Connection to the simulator. Holds the model opened for routine runs.
#[derive(Debug, Default)]
pub struct SimulatorClient {
    model_path: Option<PathBuf>,
}

impl SimulatorClient {
    pub fn new() -> SimulatorClient {
        SimulatorClient::default()
    }

    /// Runs the default model once to check the simulator answers.
    pub fn test_connection(&self) -> Result<(), ClientError> {
        HeatExchanger::default()
            .simulate()
            .map_err(ClientError::Connection)?;
        tracing::debug!(simulator = SIMULATOR_VERSION, "Connection test successful");
        Ok(())
    }

    pub fn connector_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn simulator_version(&self) -> &'static str {
        SIMULATOR_VERSION
    }

    pub async fn open_model(&mut self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClientError::ModelNotFound(path.to_path_buf()));
            }
            Err(err) => return Err(ClientError::Io(err)),
        };

        if !metadata.is_file() {
            return Err(ClientError::NotAFile(path.to_path_buf()));
        }

        tracing::info!(model = %path.display(), "Model file accepted");
        self.model_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::{ClientError, SimulatorClient};

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("simconn-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn open_missing_model() {
        let mut client = SimulatorClient::new();
        let res = client.open_model(scratch_path("missing.xml")).await;
        assert!(matches!(res, Err(ClientError::ModelNotFound(_))));
        assert!(res.unwrap_err().to_string().contains("Model file not found"));
        assert_eq!(None, client.model_path());
    }

    #[tokio::test]
    async fn open_existing_model() {
        let path = scratch_path("exchanger.xml");
        tokio::fs::write(&path, b"<mujoco/>").await.unwrap();

        let mut client = SimulatorClient::new();
        client.open_model(&path).await.unwrap();
        assert_eq!(Some(path.as_path()), client.model_path());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn open_directory_model() {
        let mut client = SimulatorClient::new();
        let res = client.open_model(std::env::temp_dir()).await;
        assert!(matches!(res, Err(ClientError::NotAFile(_))));
    }

    #[test]
    fn versions_and_connection() {
        let client = SimulatorClient::new();
        client.test_connection().unwrap();
        assert_eq!(env!("CARGO_PKG_VERSION"), client.connector_version());
        assert_eq!("heat-exchanger 1.0", client.simulator_version());
    }
}
