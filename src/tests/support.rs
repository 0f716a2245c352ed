use crate::client::ProgressSample;
use crate::config::Settings;
use crate::create_app;
use crate::state::AppState;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const MB: u64 = 1024 * 1024;

/// Value of a text field in a multipart body. Text fields precede the binary part.
pub fn multipart_text_field(body: &[u8], name: &str) -> Option<String> {
    let head = String::from_utf8_lossy(&body[..body.len().min(4096)]).into_owned();
    let marker = format!("name=\"{}\"\r\n\r\n", name);
    let start = head.find(&marker)? + marker.len();
    let rest = &head[start..];
    let end = rest.find("\r\n")?;
    Some(rest[..end].to_string())
}

/// Sparse file of `size` bytes; nothing is allocated on disk or in memory.
pub fn sparse_file(dir: &TempDir, name: &str, size: u64) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(size).unwrap();
    path
}

/// Serves the proxy on an ephemeral port, relaying to `backend_url`.
pub async fn spawn_proxy(backend_url: &str) -> (String, AppState) {
    let mut settings = Settings::default();
    settings.backend.base_url = backend_url.to_string();
    spawn_proxy_with(settings).await
}

pub async fn spawn_proxy_with(settings: Settings) -> (String, AppState) {
    let state = AppState::from_settings(&settings).unwrap();
    let app = create_app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

/// Collects every progress sample, in emission order.
#[derive(Clone, Default)]
pub struct Recorder {
    samples: Arc<Mutex<Vec<ProgressSample>>>,
}

impl Recorder {
    pub fn reporter(&self) -> impl Fn(ProgressSample) + Send + Sync + 'static {
        let samples = self.samples.clone();
        move |sample| samples.lock().unwrap().push(sample)
    }

    pub fn percents_for(&self, file_name: &str) -> Vec<u8> {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.file_name == file_name)
            .map(|s| s.percent)
            .collect()
    }
}

pub fn assert_monotonic_to_100(percents: &[u8]) {
    assert!(!percents.is_empty(), "no progress reported");
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {:?}",
        percents
    );
    assert_eq!(percents.last(), Some(&100));
}
