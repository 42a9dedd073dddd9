use chrono::{DateTime, Utc};
use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::domain::models::{Observation, ProgressEntry};
use crate::sync::ResumeTarget;

/// Raw progress report as posted by page instrumentation. Every field is
/// optional at the wire level; validation is the ingest pipeline's job.
#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ObservationDto {
    pub title: Option<String>,
    pub episode: Option<String>,
    pub time: Option<f64>,
    pub duration: Option<f64>,
    pub cover: Option<String>,
    pub url: Option<String>,
    pub platform: Option<String>,
}

impl From<ObservationDto> for Observation {
    fn from(dto: ObservationDto) -> Self {
        Observation {
            title: dto.title.unwrap_or_default(),
            episode: dto.episode,
            time: dto.time,
            duration: dto.duration,
            cover: dto.cover,
            url: dto.url,
            platform: dto.platform,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct IngestReceiptDto {
    /// False means the observation was dropped (missing title); that is a
    /// filter, not an error.
    pub accepted: bool,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ProgressRecordDto {
    pub key: String,
    pub title: String,
    pub episode: String,
    pub time: f64,
    pub duration: f64,
    pub liked: bool,
    pub cover: String,
    pub url: String,
    pub platform: String,
    pub last_updated: i64,
}

impl ProgressRecordDto {
    pub fn from_entry(key: String, entry: ProgressEntry) -> Self {
        ProgressRecordDto {
            key,
            title: entry.title,
            episode: entry.episode,
            time: entry.time,
            duration: entry.duration,
            liked: entry.liked,
            cover: entry.cover,
            url: entry.url,
            platform: entry.platform,
            last_updated: entry.last_updated,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct LikeRequestDto {
    pub platform: String,
    pub title: String,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ResumeTargetDto {
    pub key: String,
    pub title: String,
    pub url: String,
    pub time: f64,
}

impl From<ResumeTarget> for ResumeTargetDto {
    fn from(t: ResumeTarget) -> Self {
        ResumeTargetDto {
            key: t.key,
            title: t.title,
            url: t.url,
            time: t.time,
        }
    }
}

/// Credential pair delivered by the external login flow.
#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SessionPutDto {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SessionDto {
    pub authenticated: bool,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SyncStatusDto {
    pub pending: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub backend_configured: bool,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

#[derive(ApiResponse)]
pub enum IngestResponseDto {
    /// Observation processed; check `accepted`
    #[oai(status = 200)]
    Ok(Json<IngestReceiptDto>),

    /// Local store failure
    #[oai(status = 500)]
    Internal(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ProgressListResponseDto {
    /// Full local store dump
    #[oai(status = 200)]
    Ok(Json<Vec<ProgressRecordDto>>),

    /// Local store failure
    #[oai(status = 500)]
    Internal(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum LikeResponseDto {
    /// Updated record
    #[oai(status = 200)]
    Ok(Json<ProgressRecordDto>),

    /// No entry for the given platform and title
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    /// Local store failure
    #[oai(status = 500)]
    Internal(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ResumeResponseDto {
    /// Best matching resume target
    #[oai(status = 200)]
    Ok(Json<ResumeTargetDto>),

    /// Nothing stored matches the given URL
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    /// Local store failure
    #[oai(status = 500)]
    Internal(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SessionPutResponseDto {
    /// Session established
    #[oai(status = 200)]
    Ok,

    /// Token or user id missing/empty
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SessionGetResponseDto {
    /// Current session state
    #[oai(status = 200)]
    Ok(Json<SessionDto>),
}

#[derive(ApiResponse)]
pub enum EmptyOkResponseDto {
    /// Empty 200 response
    #[oai(status = 200)]
    Ok,
}

#[derive(ApiResponse)]
pub enum SyncStatusResponseDto {
    /// Scheduler and queue state
    #[oai(status = 200)]
    Ok(Json<SyncStatusDto>),
}
