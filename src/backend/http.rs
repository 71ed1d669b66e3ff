//! HTTP implementation of the meeting backend.
//!
//! JSON over HTTP; `transcribe` uploads the clip as multipart form data.
//! The API reports failures either as a non-2xx status or as an `error`
//! field inside a 200 body, so both are checked on every call. A missing
//! success field (e.g. no `id` back from save) is treated as an error.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audio::AudioClip;

use super::{
    BackendError, ChatTurn, Classification, EmailStyle, EmailType, MeetingBackend,
    RecordingDetail, RecordingSummary,
};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        info!("Meeting backend at {}", base_url);
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read a response body, surfacing non-2xx statuses and in-body
    /// `error` fields as [`BackendError::Api`].
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let status = response.status();
        let body = response.text().await?;

        if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(BackendError::Api(err.error));
        }
        if !status.is_success() {
            return Err(BackendError::Api(format!(
                "request failed with status {status}: {body}"
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let request_id = Uuid::new_v4();
        debug!("POST {} [{}]", path, request_id);
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let request_id = Uuid::new_v4();
        debug!("GET {} [{}]", path, request_id);
        let response = self.client.get(self.url(path)).send().await?;
        Self::read_json(response).await
    }
}

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Deserialize)]
struct SaveResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct NameResponse {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RenameResponse {
    #[serde(default)]
    ok: bool,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Deserialize)]
struct EmailResponse {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    answer: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, BackendError> {
    value.ok_or_else(|| BackendError::Api(format!("response missing `{field}`")))
}

#[async_trait]
impl MeetingBackend for HttpBackend {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, BackendError> {
        let request_id = Uuid::new_v4();
        debug!(
            "POST /transcribe [{}] ({} bytes, {} Hz)",
            request_id,
            clip.wav.len(),
            clip.sample_rate
        );

        let form = Form::new().part(
            "audio",
            Part::bytes(clip.wav)
                .file_name("recording.wav")
                .mime_str("audio/wav")?,
        );

        let response = self
            .client
            .post(self.url("/transcribe"))
            .multipart(form)
            .send()
            .await?;

        let parsed: TranscribeResponse = Self::read_json(response).await?;
        required(parsed.transcript, "transcript")
    }

    async fn save_recording(&self, transcript: &str, duration: u64) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            transcript: &'a str,
            duration: u64,
        }

        let parsed: SaveResponse = self
            .post_json(
                "/save_recording",
                &Body {
                    transcript,
                    duration,
                },
            )
            .await?;
        required(parsed.id, "id")
    }

    async fn analyze(&self, transcript: &str) -> Result<Classification, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            transcript: &'a str,
        }

        self.post_json("/analyze", &Body { transcript }).await
    }

    async fn generate_name(&self, id: &str, transcript: &str) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            id: &'a str,
            transcript: &'a str,
        }

        let parsed: NameResponse = self
            .post_json("/generate_name", &Body { id, transcript })
            .await?;
        required(parsed.name, "name")
    }

    async fn list_recordings(&self) -> Result<Vec<RecordingSummary>, BackendError> {
        self.get_json("/recordings").await
    }

    async fn get_recording(&self, id: &str) -> Result<RecordingDetail, BackendError> {
        self.get_json(&format!("/recording/{id}")).await
    }

    async fn delete_recording(&self, id: &str) -> Result<(), BackendError> {
        let request_id = Uuid::new_v4();
        debug!("DELETE /recording/{} [{}]", id, request_id);
        let response = self
            .client
            .delete(self.url(&format!("/recording/{id}")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!(
                "delete failed with status {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn rename_recording(&self, id: &str, name: &str) -> Result<(), BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            id: &'a str,
            name: &'a str,
        }

        let parsed: RenameResponse = self
            .post_json("/rename_recording", &Body { id, name })
            .await?;
        if !parsed.ok {
            return Err(BackendError::Api("rename was not acknowledged".to_string()));
        }
        Ok(())
    }

    async fn summarize(&self, transcript: &str) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            transcript: &'a str,
        }

        let parsed: SummaryResponse = self.post_json("/summarize", &Body { transcript }).await?;
        required(parsed.summary, "summary")
    }

    async fn draft_email(
        &self,
        transcript: &str,
        summary: &str,
        email_type: EmailType,
    ) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            transcript: &'a str,
            summary: &'a str,
            email_type: EmailType,
        }

        let parsed: EmailResponse = self
            .post_json(
                "/email",
                &Body {
                    transcript,
                    summary,
                    email_type,
                },
            )
            .await?;
        required(parsed.email, "email")
    }

    async fn regenerate_email(
        &self,
        transcript: &str,
        summary: &str,
        current_email: &str,
        style: EmailStyle,
    ) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            transcript: &'a str,
            summary: &'a str,
            current_email: &'a str,
            style: EmailStyle,
        }

        let parsed: EmailResponse = self
            .post_json(
                "/email/regenerate",
                &Body {
                    transcript,
                    summary,
                    current_email,
                    style,
                },
            )
            .await?;
        required(parsed.email, "email")
    }

    async fn quick_edit_email(
        &self,
        current_email: &str,
        instruction: &str,
    ) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            current_email: &'a str,
            instruction: &'a str,
        }

        let parsed: EmailResponse = self
            .post_json(
                "/email/quick-edit",
                &Body {
                    current_email,
                    instruction,
                },
            )
            .await?;
        required(parsed.email, "email")
    }

    async fn chat(
        &self,
        question: &str,
        transcript: &str,
        history: &[ChatTurn],
        summary: &str,
    ) -> Result<String, BackendError> {
        #[derive(Serialize)]
        struct Body<'a> {
            question: &'a str,
            transcript: &'a str,
            history: &'a [ChatTurn],
            summary: &'a str,
        }

        let parsed: ChatResponse = self
            .post_json(
                "/chat",
                &Body {
                    question,
                    transcript,
                    history,
                    summary,
                },
            )
            .await?;
        required(parsed.answer, "answer")
    }
}
