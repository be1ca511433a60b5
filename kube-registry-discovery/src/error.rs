use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("sync error: {0}")]
    Sync(#[from] kube_registry_sync::Error),

    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("failed to infer kube config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("failed to create config from kubeconfig: {0}")]
    KubeConfig(#[from] kube::config::KubeconfigError),

    #[error("conversion error: {0}")]
    ConversionError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
