use kube::Client;
use kube::config::KubeConfigOptions;

use crate::Result;

/// Client for the given kubeconfig context, or for the inferred in-cluster
/// or default configuration when no context is given.
pub async fn client(context: Option<String>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            kube::Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(context),
                ..Default::default()
            })
            .await?
        }
        None => kube::Config::infer().await?,
    };
    Ok(Client::try_from(config)?)
}
