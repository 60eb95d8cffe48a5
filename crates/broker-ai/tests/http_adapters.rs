//! Wire-format checks for the outbound HTTP adapters against a local capture server.

mod common {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, Uri};
    use axum::response::IntoResponse;
    use axum::Router;
    use serde_json::{json, Value};

    #[derive(Debug, Clone)]
    pub(super) struct Captured {
        pub(super) method: Method,
        pub(super) path: String,
        pub(super) headers: HeaderMap,
        pub(super) body: Bytes,
    }

    impl Captured {
        pub(super) fn json(&self) -> Value {
            serde_json::from_slice(&self.body).expect("json body")
        }

        pub(super) fn header(&self, name: &str) -> &str {
            self.headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
        }
    }

    pub(super) type Captures = Arc<Mutex<Vec<Captured>>>;

    async fn capture(
        State(captures): State<Captures>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> impl IntoResponse {
        let path = uri.path().to_string();
        captures
            .lock()
            .expect("capture mutex poisoned")
            .push(Captured {
                method,
                path: path.clone(),
                headers,
                body,
            });
        let reply = if path.ends_with("/chat/completions") {
            json!({"choices": [{"message": {"role": "assistant", "content": "¡Hola!"}}]})
        } else if path.ends_with("/audio/transcriptions") {
            json!({"text": " quiero vender mi casa "})
        } else {
            json!({"messages": [{"status": {"groupName": "PENDING"}}]})
        };
        axum::Json(reply)
    }

    /// Serves every path on an ephemeral port and records the requests it receives.
    pub(super) async fn capture_server() -> (SocketAddr, Captures) {
        let captures = Captures::default();
        let app = Router::new().fallback(capture).with_state(captures.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener binds");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("capture server runs");
        });
        (addr, captures)
    }

    pub(super) fn taken(captures: &Captures) -> Vec<Captured> {
        captures.lock().expect("capture mutex poisoned").clone()
    }
}

use broker_ai::agents::{ChatMessage, LanguageModel, OpenAiModel};
use broker_ai::channels::whatsapp::{InfobipClient, MessagingGateway, TemplateMessage};
use broker_ai::config::{LlmConfig, StorageConfig, WhatsAppConfig};
use broker_ai::storage::{Artifact, ArtifactStore, S3ArtifactStore};

use common::*;

fn whatsapp_config(base_url: String) -> WhatsAppConfig {
    WhatsAppConfig {
        api_key: "infobip-key".to_string(),
        base_url,
        sender: "573009990000".to_string(),
    }
}

#[tokio::test]
async fn infobip_text_and_template_requests() {
    let (addr, captures) = capture_server().await;
    let client = InfobipClient::new(&whatsapp_config(format!("http://{addr}/"))).expect("client builds");

    client
        .send_text("573001112233", "¡Hola Ana!")
        .await
        .expect("text accepted");
    client
        .send_template(
            "573001112233",
            &TemplateMessage {
                name: "banner_qr_broky".to_string(),
                language: "es".to_string(),
                body_placeholders: vec!["Ana".to_string()],
                header_image: Some("https://cdn.example/qr.png".to_string()),
            },
        )
        .await
        .expect("template accepted");

    let requests = taken(&captures);
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/whatsapp/1/message");
        assert_eq!(request.header("authorization"), "App infobip-key");
    }

    let text = requests[0].json();
    assert_eq!(text["messages"][0]["from"], "573009990000");
    assert_eq!(text["messages"][0]["to"], "573001112233");
    assert_eq!(text["messages"][0]["content"]["text"], "¡Hola Ana!");

    let template = requests[1].json();
    let content = &template["messages"][0]["content"];
    assert_eq!(content["templateName"], "banner_qr_broky");
    assert_eq!(content["language"], "es");
    assert_eq!(content["templateData"]["body"]["placeholders"][0], "Ana");
    assert_eq!(content["templateData"]["header"]["type"], "IMAGE");
    assert_eq!(
        content["templateData"]["header"]["mediaUrl"],
        "https://cdn.example/qr.png"
    );
}

#[tokio::test]
async fn infobip_media_download_is_authorized() {
    let (addr, captures) = capture_server().await;
    let client = InfobipClient::new(&whatsapp_config(format!("http://{addr}"))).expect("client builds");

    let bytes = client
        .download_media(&format!("http://{addr}/whatsapp/1/senders/5730/media/abc"))
        .await
        .expect("media downloads");

    assert!(!bytes.is_empty());
    let requests = taken(&captures);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].header("authorization"), "App infobip-key");
}

fn llm_config(base_url: String) -> LlmConfig {
    LlmConfig {
        api_key: "sk-test".to_string(),
        base_url,
        model: "gpt-4o".to_string(),
        transcription_model: "whisper-1".to_string(),
        max_tool_rounds: 4,
    }
}

#[tokio::test]
async fn openai_chat_completion_round_trip() {
    let (addr, captures) = capture_server().await;
    let model = OpenAiModel::new(&llm_config(format!("http://{addr}/v1"))).expect("model builds");

    let completion = model
        .complete(&[ChatMessage::system("sistema"), ChatMessage::user("hola")], &[])
        .await
        .expect("completion parses");

    assert_eq!(completion.content.as_deref(), Some("¡Hola!"));
    let requests = taken(&captures);
    assert_eq!(requests[0].path, "/v1/chat/completions");
    assert_eq!(requests[0].header("authorization"), "Bearer sk-test");
    let body = requests[0].json();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["messages"][1]["role"], "user");
}

#[tokio::test]
async fn openai_transcription_uses_multipart() {
    let (addr, captures) = capture_server().await;
    let model = OpenAiModel::new(&llm_config(format!("http://{addr}/v1"))).expect("model builds");

    let text = model
        .transcribe(vec![0u8; 16], "audio.ogg")
        .await
        .expect("transcription parses");

    assert_eq!(text, "quiero vender mi casa");
    let requests = taken(&captures);
    assert_eq!(requests[0].path, "/v1/audio/transcriptions");
    assert!(requests[0]
        .header("content-type")
        .starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("whisper-1"));
    assert!(body.contains("filename=\"audio.ogg\""));
}

#[tokio::test]
async fn s3_put_is_signed_and_path_style_on_custom_endpoint() {
    let (addr, captures) = capture_server().await;
    let store = S3ArtifactStore::new(&StorageConfig {
        access_key: "AKIDEXAMPLE".to_string(),
        secret_key: "secret".to_string(),
        region: "us-east-1".to_string(),
        bucket: "broky-images".to_string(),
        folder: "uploads".to_string(),
        endpoint: Some(format!("http://{addr}")),
    })
    .expect("store builds");

    let url = store
        .upload(Artifact::png(vec![137, 80, 78, 71]))
        .await
        .expect("upload accepted");

    assert!(url.starts_with(&format!("http://{addr}/broky-images/uploads/")));
    assert!(url.ends_with(".png"));

    let requests = taken(&captures);
    let request = &requests[0];
    assert_eq!(request.method, "PUT");
    assert!(request.path.starts_with("/broky-images/uploads/"));
    assert_eq!(request.header("content-type"), "image/png");
    assert!(request
        .header("authorization")
        .starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert_eq!(request.header("x-amz-content-sha256").len(), 64);
    assert_eq!(request.body.as_ref(), &[137, 80, 78, 71]);
}
