use std::sync::Arc;

use poem_openapi::{OpenApi, param::Query, payload::PlainText};

use super::models::{
    EmptyOkResponseDto, IngestResponseDto, LikeRequestDto, LikeResponseDto, ObservationDto,
    ProgressListResponseDto, ResumeResponseDto, SessionGetResponseDto, SessionPutDto,
    SessionPutResponseDto, SyncStatusResponseDto,
};
use super::services::{progress::ProgressService, session::SessionService};
use crate::config::Config;
use crate::sync::SyncEngine;

pub struct VidSyncApi {
    pub engine: Arc<SyncEngine>,
    pub config: Arc<Config>,
}

#[OpenApi]
impl VidSyncApi {
    /// Liveness probe
    #[oai(path = "/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> PlainText<String> {
        PlainText(format!(
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Ingest one raw progress observation
    #[oai(path = "/v1/observations", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn ingest_observation(
        &self,
        body: poem_openapi::payload::Json<ObservationDto>,
    ) -> IngestResponseDto {
        ProgressService::new(&self.engine).ingest(body.0).await
    }

    /// Full dump of the local progress store
    #[oai(path = "/v1/progress", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_progress(&self) -> ProgressListResponseDto {
        ProgressService::new(&self.engine).list().await
    }

    /// Toggle the like flag on one stored entry
    #[oai(path = "/v1/progress/like", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn toggle_like(
        &self,
        body: poem_openapi::payload::Json<LikeRequestDto>,
    ) -> LikeResponseDto {
        ProgressService::new(&self.engine).toggle_like(body.0).await
    }

    /// Resume lookup: best stored entry for a context URL
    #[oai(path = "/v1/resume", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, url))]
    async fn resume(
        &self,
        /// Current page URL; matched against stored URLs ignoring fragments
        Query(url): Query<String>,
    ) -> ResumeResponseDto {
        ProgressService::new(&self.engine).resume(&url).await
    }

    /// Store the credential pair from the external login flow
    #[oai(path = "/v1/session", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn put_session(
        &self,
        body: poem_openapi::payload::Json<SessionPutDto>,
    ) -> SessionPutResponseDto {
        SessionService::new(&self.engine).put(body.0).await
    }

    /// Log out: clear token and user id together
    #[oai(path = "/v1/session", method = "delete")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_session(&self) -> EmptyOkResponseDto {
        SessionService::new(&self.engine).logout().await
    }

    /// Current session state
    #[oai(path = "/v1/session", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_session(&self) -> SessionGetResponseDto {
        SessionService::new(&self.engine).get().await
    }

    /// Pending queue and last-sync state
    #[oai(path = "/v1/sync/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn sync_status(&self) -> SyncStatusResponseDto {
        SessionService::new(&self.engine)
            .sync_status(self.config.backend_url.is_some())
            .await
    }
}
