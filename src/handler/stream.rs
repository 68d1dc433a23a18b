use std::sync::{Arc, LazyLock};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{self, CameraConfig},
    handler::ApiResult,
    manager,
    media::{
        encoder::FfmpegEncoder,
        session::{start_transcode, TranscodeOptions},
        stream::{mjpeg_stream, MJPEG_CONTENT_TYPE},
        types::EncoderProfile,
    },
};

static ENCODER: LazyLock<FfmpegEncoder> = LazyLock::new(FfmpegEncoder::new);

pub fn stream_router(cancel: CancellationToken) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stream/{camera}", get(stream))
        .route("/video/{camera}", get(video_ts))
        .route("/video/{camera}/mp4", get(video_mp4))
        .route("/snapshot/{camera}", get(snapshot))
        .route("/api/cameras", get(api_cameras))
        .with_state(cancel)
}

/// MJPEG passthrough stream for one camera.
async fn stream(
    Path(camera): Path<String>,
    State(cancel): State<CancellationToken>,
) -> Response {
    let Some(source) = manager::get_source(&camera).await else {
        return (StatusCode::NOT_FOUND, "Camera not found").into_response();
    };
    let body = Body::from_stream(mjpeg_stream(
        Arc::clone(&source.buffer),
        config::config().frame_interval(),
        cancel.child_token(),
    ));
    ([(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)], body).into_response()
}

/// H.264 over MPEG-TS; lower bandwidth than MJPEG, continuous viewing.
async fn video_ts(
    Path(camera): Path<String>,
    State(cancel): State<CancellationToken>,
) -> ApiResult<Response> {
    transcode(&camera, EncoderProfile::Mpegts, cancel).await
}

/// H.264 in fragmented MP4, for seek-capable HTML5 playback.
async fn video_mp4(
    Path(camera): Path<String>,
    State(cancel): State<CancellationToken>,
) -> ApiResult<Response> {
    transcode(&camera, EncoderProfile::Fmp4, cancel).await
}

async fn transcode(
    camera: &str,
    profile: EncoderProfile,
    cancel: CancellationToken,
) -> ApiResult<Response> {
    let Some(source) = manager::get_source(camera).await else {
        return Ok((StatusCode::NOT_FOUND, "Camera not found").into_response());
    };
    let options = TranscodeOptions::new(config::config().framerate(), profile);
    let session = start_transcode(
        Arc::clone(&source.buffer),
        &*ENCODER,
        options,
        cancel.child_token(),
    )
    .await?;
    let content_type = session.content_type();
    let body = Body::from_stream(session.into_stream());
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// Single JPEG of the latest frame.
async fn snapshot(Path(camera): Path<String>) -> Response {
    let Some(source) = manager::get_source(&camera).await else {
        return (StatusCode::NOT_FOUND, "Camera not found").into_response();
    };
    match source.buffer.get() {
        Some(frame) => {
            ([(header::CONTENT_TYPE, "image/jpeg")], frame.jpeg.clone()).into_response()
        }
        None => (StatusCode::SERVICE_UNAVAILABLE, "No frame available").into_response(),
    }
}

async fn api_cameras() -> Json<Vec<CameraConfig>> {
    Json(manager::list_cameras().await)
}

/// Page title and heading differ: the title carries a dash separator.
fn page_titles(station_name: &str) -> (String, String) {
    if station_name.is_empty() {
        let fallback = "Can Inspection Station".to_string();
        (fallback.clone(), fallback)
    } else {
        (
            format!("Can Inspection - {}", station_name),
            format!("Can Inspection {}", station_name),
        )
    }
}

async fn index() -> Html<String> {
    let (title, heading) = page_titles(config::config().station_name());

    let mut cameras_html = String::new();
    for camera in manager::list_cameras().await {
        cameras_html.push_str(&format!(
            r#"
        <div class="camera">
            <h2>{label}</h2>
            <img src="/stream/{name}" alt="{label}">
            <p>{description}</p>
            <p class="links">
                <a href="/video/{name}">mpeg-ts</a>
                <a href="/video/{name}/mp4">mp4</a>
                <a href="/snapshot/{name}">snapshot</a>
            </p>
        </div>"#,
            name = camera.name,
            label = camera.label,
            description = camera.description,
        ));
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <style>
        body {{ background: #222; color: #fff; font-family: monospace; margin: 0; padding: 20px; }}
        h1 {{ text-align: center; }}
        .camera {{ display: inline-block; margin: 10px; padding: 10px; background: #333; border-radius: 4px; vertical-align: top; }}
        .camera img {{ max-width: 640px; display: block; }}
        .links a {{ color: #9cf; margin-right: 10px; }}
    </style>
</head>
<body>
    <h1>{heading}</h1>
    <div class="cameras">{cameras_html}</div>
</body>
</html>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::page_titles;

    #[test]
    fn test_page_titles() {
        let (title, heading) = page_titles("Line 3");
        assert_eq!(title, "Can Inspection - Line 3");
        assert_eq!(heading, "Can Inspection Line 3");

        let (title, heading) = page_titles("");
        assert_eq!(title, "Can Inspection Station");
        assert_eq!(heading, "Can Inspection Station");
    }
}
