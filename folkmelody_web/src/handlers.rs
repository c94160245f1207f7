// HTTP handlers for the seed form, generation, and download.

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    Form,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
};
use folkmelody_music::generator::GenerationParams;
use folkmelody_music::render::{RenderFormat, save_melody};
use folkmelody_music::token::join_tokens;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::info;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const DOWNLOAD_NAME: &str = "melody.mid";

#[derive(Debug, Deserialize)]
pub struct PredictForm {
    pub melody: Option<String>,
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_page(result: Option<&str>) -> String {
    let block = match result {
        Some(melody) => format!(
            "<div class=\"result\">The generated melody: {}</div>\n    \
             <p><a href=\"/download\">Download MIDI</a></p>",
            escape_html(melody)
        ),
        None => String::new(),
    };
    INDEX_TEMPLATE.replace("{{RESULT}}", &block)
}

/// GET /
pub async fn index() -> Html<String> {
    Html(render_page(None))
}

/// POST /predict
///
/// Generates from the submitted seed with the configured step budget and
/// temperature, renders the melody to the output MIDI file, and returns the
/// page with the full token sequence.
pub async fn predict(
    State(state): State<AppState>,
    Form(form): Form<PredictForm>,
) -> ApiResult<Html<String>> {
    let seed = form
        .melody
        .ok_or_else(|| ApiError::BadRequest("missing form field 'melody'".into()))?;

    let _guard = state.output_lock.lock().await;

    let generator = state.generator.clone();
    let config = state.config.clone();
    let melody = tokio::task::spawn_blocking(move || {
        let params = GenerationParams {
            num_steps: config.num_steps,
            max_sequence_length: config.sequence_length,
            temperature: config.temperature,
        };
        let mut rng = StdRng::from_os_rng();
        let melody = generator.generate_from_str(&seed, &params, &mut rng)?;
        save_melody(
            &melody.tokens,
            config.step_duration,
            RenderFormat::Midi,
            config.tempo_bpm,
            &config.output_path,
        )?;
        Ok::<_, ApiError>(melody)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("generation task failed: {e}")))??;

    info!(
        tokens = melody.tokens.len(),
        steps = melody.steps,
        stop = ?melody.stop_reason,
        "melody generated"
    );

    Ok(Html(render_page(Some(&join_tokens(&melody.tokens)))))
}

/// GET /download
pub async fn download(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let _guard = state.output_lock.lock().await;
    let path = &state.config.output_path;
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(
                "no melody has been generated yet".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "audio/midi".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("60 _ r"), "60 _ r");
        assert_eq!(
            escape_html("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_render_page() {
        let empty = render_page(None);
        assert!(!empty.contains("{{RESULT}}"));
        assert!(!empty.contains("/download"));

        let page = render_page(Some("60 _ 62"));
        assert!(page.contains("The generated melody: 60 _ 62"));
        assert!(page.contains("href=\"/download\""));
    }
}
