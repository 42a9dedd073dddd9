use poem_openapi::payload::Json;

use crate::api::models::{
    EmptyOkResponseDto, ErrorDto, SessionDto, SessionGetResponseDto, SessionPutDto,
    SessionPutResponseDto, SyncStatusDto, SyncStatusResponseDto,
};
use crate::sync::SyncEngine;

pub struct SessionService<'a> {
    pub engine: &'a SyncEngine,
}

impl<'a> SessionService<'a> {
    pub fn new(engine: &'a SyncEngine) -> Self {
        Self { engine }
    }

    /// Store the credential pair delivered by the external login flow.
    #[tracing::instrument(level = "debug", skip(self, req))]
    pub async fn put(&self, req: SessionPutDto) -> SessionPutResponseDto {
        if req.token.trim().is_empty() || req.user_id.trim().is_empty() {
            return SessionPutResponseDto::BadRequest(Json(ErrorDto {
                message: "token and userId are both required".into(),
            }));
        }
        self.engine.set_session(&req.token, &req.user_id).await;
        SessionPutResponseDto::Ok
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn logout(&self) -> EmptyOkResponseDto {
        self.engine.clear_session().await;
        EmptyOkResponseDto::Ok
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get(&self) -> SessionGetResponseDto {
        let user_id = self.engine.session_user().await;
        SessionGetResponseDto::Ok(Json(SessionDto {
            authenticated: user_id.is_some(),
            user_id,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync_status(&self, backend_configured: bool) -> SyncStatusResponseDto {
        let status = self.engine.status().await;
        SyncStatusResponseDto::Ok(Json(SyncStatusDto {
            pending: status.pending as u64,
            last_sync_at: status.last_sync_at,
            backend_configured,
            authenticated: status.authenticated,
        }))
    }
}
