use cni_templater_core::reconciler::error::ReconcilerError as ConfigReconcilerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Couldn't update the CNI config! Reason: {}", .0)]
    CniConfigError(ConfigReconcilerError),
}
