//! Shared fixtures: a fake HTTP endpoint and recording seams.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
};

use premedia_update::{
    UpdateError, UpdaterConfig, handoff::HelperLauncher, prompt::Prompt,
};
use sha2::{Digest, Sha256};
use tiny_http::{Response, Server, StatusCode};

pub const HELPER_NAME: &str = "updater-under-test";

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Serves fixed bodies by path and records every request URL.
pub struct FakeServer {
    server: Arc<Server>,
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>,
    hooks: Arc<Mutex<HashMap<String, Hook>>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fake server"));
        let addr = server.server_addr().to_ip().expect("ip listener");
        let routes: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>> = Arc::default();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let hooks: Arc<Mutex<HashMap<String, Hook>>> = Arc::default();

        let srv = Arc::clone(&server);
        let table = Arc::clone(&routes);
        let on_request = Arc::clone(&hooks);
        let seen = Arc::clone(&hits);
        thread::spawn(move || {
            for request in srv.incoming_requests() {
                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or_default().to_string();
                seen.lock().unwrap().push(url);
                let hook = on_request.lock().unwrap().get(&path).cloned();
                if let Some(hook) = hook {
                    hook();
                }
                let route = table.lock().unwrap().get(&path).cloned();
                let response = match route {
                    Some((status, body)) => {
                        Response::from_data(body).with_status_code(StatusCode(status))
                    }
                    None => Response::from_data(b"not found".to_vec())
                        .with_status_code(StatusCode(404)),
                };
                let _ = request.respond(response);
            }
        });

        Self {
            server,
            addr,
            routes,
            hooks,
            hits,
        }
    }

    /// Run `hook` whenever `path` is requested, before the response is sent.
    pub fn on_request(&self, path: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .insert(path.to_string(), Arc::new(hook));
    }

    pub fn route(&self, path: &str, status: u16, body: Vec<u8>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body));
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_paths(&self) -> Vec<String> {
        self.hits()
            .iter()
            .map(|u| u.split('?').next().unwrap_or_default().to_string())
            .collect()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

/// Prompt with a canned answer that counts how often it was asked.
#[derive(Clone)]
pub struct RecordingPrompt {
    answer: bool,
    asked: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingPrompt {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.lock().unwrap().len()
    }
}

impl Prompt for RecordingPrompt {
    fn confirm(&self, current: &str, latest: &str) -> bool {
        self.asked
            .lock()
            .unwrap()
            .push((current.to_string(), latest.to_string()));
        self.answer
    }
}

/// Helper launcher that records calls instead of spawning.
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>>,
}

impl RecordingLauncher {
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl HelperLauncher for RecordingLauncher {
    fn launch(&self, helper: &Path, new_exe: &Path, old_exe: &Path) -> Result<u32, UpdateError> {
        self.calls.lock().unwrap().push((
            helper.to_path_buf(),
            new_exe.to_path_buf(),
            old_exe.to_path_buf(),
        ));
        Ok(4242)
    }
}

/// Install layout on disk: the running executable, its helper and a download dir.
pub struct Install {
    pub root: tempfile::TempDir,
}

impl Install {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("app")).unwrap();
        std::fs::write(root.path().join("app").join("Premedia.exe"), b"old build").unwrap();
        std::fs::write(root.path().join("app").join(HELPER_NAME), b"helper").unwrap();
        Self { root }
    }

    pub fn without_helper() -> Self {
        let install = Self::new();
        std::fs::remove_file(install.root.path().join("app").join(HELPER_NAME)).unwrap();
        install
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.path().join("app")
    }

    pub fn executable(&self) -> PathBuf {
        self.app_dir().join("Premedia.exe")
    }

    pub fn helper(&self) -> PathBuf {
        self.app_dir().join(HELPER_NAME)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.path().join("downloads")
    }

    pub fn downloads(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.download_dir()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn config(&self, manifest_url: String, current_version: &str) -> UpdaterConfig {
        UpdaterConfig {
            manifest_url,
            current_version: current_version.to_string(),
            fetch_timeout_secs: 5,
            download_timeout_secs: 5,
            download_dir: Some(self.download_dir()),
            target_executable: Some(self.executable()),
            install_dir: None,
            helper_name: Some(HELPER_NAME.to_string()),
            log_dir: Some(self.root.path().join("logs")),
            log_level: "debug".to_string(),
        }
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn manifest_json(version: &str, mandatory: bool, windows_url: &str, sha256: &str) -> Vec<u8> {
    serde_json::json!({
        "version": version,
        "mandatory": mandatory,
        "windows": { "url": windows_url, "sha256": sha256 },
        "mac": { "url": "https://unused.invalid/Premedia.dmg", "sha256": "0".repeat(64) }
    })
    .to_string()
    .into_bytes()
}
