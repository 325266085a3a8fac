use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad direction token: {0:?}")]
    BadDirection(String),
}
