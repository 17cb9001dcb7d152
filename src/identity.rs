use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

const VISITOR_ID_KEY: &str = "visitor_id";
const USER_ID_KEY: &str = "user_id";

/// The request's identity for visit tracking.
///
/// `session_id` is a stable per-browser-session token, assigned here on first
/// contact and persisted in the session store. `user_id` is only present when
/// an upstream authentication layer has stored one in the session; this
/// extractor never creates it. The analytics functions receive both as plain
/// values and never touch session state themselves.
pub struct Visitor {
    pub session_id: String,
    pub user_id: Option<String>,
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| IdentityRejection)?;

        let session_id = match session.get::<String>(VISITOR_ID_KEY).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = Uuid::new_v4().to_string();
                session
                    .insert(VISITOR_ID_KEY, id.clone())
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to store visitor id: {e}");
                        IdentityRejection
                    })?;
                id
            }
            Err(e) => {
                tracing::error!("Failed to load visitor id: {e}");
                return Err(IdentityRejection);
            }
        };

        let user_id: Option<String> = session.get(USER_ID_KEY).await.ok().flatten();

        Ok(Visitor {
            session_id,
            user_id,
        })
    }
}

pub struct IdentityRejection;

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}
