use poem_openapi::payload::Json;

use crate::api::models::{
    ErrorDto, IngestReceiptDto, IngestResponseDto, LikeRequestDto, LikeResponseDto,
    ObservationDto, ProgressListResponseDto, ProgressRecordDto, ResumeResponseDto,
    ResumeTargetDto,
};
use crate::domain::models::Observation;
use crate::sync::SyncEngine;

pub struct ProgressService<'a> {
    pub engine: &'a SyncEngine,
}

impl<'a> ProgressService<'a> {
    pub fn new(engine: &'a SyncEngine) -> Self {
        Self { engine }
    }

    #[tracing::instrument(level = "debug", skip(self, dto))]
    pub async fn ingest(&self, dto: ObservationDto) -> IngestResponseDto {
        let observation: Observation = dto.into();
        match self.engine.ingest(&observation).await {
            Ok(accepted) => IngestResponseDto::Ok(Json(IngestReceiptDto { accepted })),
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), "failed to ingest observation");
                IngestResponseDto::Internal(Json(ErrorDto {
                    message: format!("store error: {}", e),
                }))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list(&self) -> ProgressListResponseDto {
        match self.engine.export().await {
            Ok(records) => {
                let dtos = records
                    .into_iter()
                    .map(|(key, entry)| ProgressRecordDto::from_entry(key, entry))
                    .collect();
                ProgressListResponseDto::Ok(Json(dtos))
            }
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), "failed to list progress");
                ProgressListResponseDto::Internal(Json(ErrorDto {
                    message: format!("store error: {}", e),
                }))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, req))]
    pub async fn toggle_like(&self, req: LikeRequestDto) -> LikeResponseDto {
        match self.engine.toggle_like(&req.platform, &req.title).await {
            Ok(Some((key, entry))) => {
                LikeResponseDto::Ok(Json(ProgressRecordDto::from_entry(key, entry)))
            }
            Ok(None) => LikeResponseDto::NotFound(Json(ErrorDto {
                message: format!("no entry for {}:{}", req.platform, req.title),
            })),
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), "failed to toggle like");
                LikeResponseDto::Internal(Json(ErrorDto {
                    message: format!("store error: {}", e),
                }))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, url))]
    pub async fn resume(&self, url: &str) -> ResumeResponseDto {
        match self.engine.resume_target(url).await {
            Ok(Some(target)) => ResumeResponseDto::Ok(Json(ResumeTargetDto::from(target))),
            Ok(None) => ResumeResponseDto::NotFound(Json(ErrorDto {
                message: "no stored entry matches this URL".into(),
            })),
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), "failed to look up resume target");
                ResumeResponseDto::Internal(Json(ErrorDto {
                    message: format!("store error: {}", e),
                }))
            }
        }
    }
}
