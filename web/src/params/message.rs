use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct MessageParams {
    /// Session id returned in the stream handshake.
    #[serde(rename = "sessionId")]
    pub(crate) session_id: Option<String>,
}
