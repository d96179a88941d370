//! Publish orchestration: uid, cache, payload, upload, then local artifacts.
//!
//! # Flow
//!
//! ```text
//! Start ─► BuildPayload ─► Skip | LocalMode | Upload ─► CacheUpdate? ─► Save? ─► Print? ─► Done
//! ```
//!
//! Nothing here returns an error to the caller. Every failure ends up as a
//! [`Notice`] and, when fatal to publishing, in [`PublishOutcome::error`].

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::cache::{CacheLoad, PayloadCache};
use crate::client::{HttpUploader, PayloadUploader};
use crate::error::{ProbeDockError, ProbeDockResult};
use crate::io::{server_dir, write_atomic};
use crate::payload::{Payload, PayloadOptions};
use crate::run::TestRun;
use crate::server::ServerProfile;
use crate::uid::UidManager;

const PAYLOAD_FILE: &str = "payload.json";
const CONSOLE_PREFIX: &str = "ProbeDock - ";

/// Publishing switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Send the payload to the server.
    pub publish: bool,
    /// Pretend to send; no network I/O.
    pub local_mode: bool,
    pub cache_payload: bool,
    pub print_payload: bool,
    pub save_payload: bool,
    pub workspace: Option<PathBuf>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            publish: true,
            local_mode: false,
            cache_payload: false,
            print_payload: false,
            save_payload: false,
            workspace: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A progress or diagnostic line for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Where notices and dumps are written.
///
/// Info goes to stdout, warnings and errors to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    silent: bool,
}

impl Console {
    pub fn stdio() -> Self {
        Self { silent: false }
    }

    /// Discard everything; notices are still collected on the outcome.
    pub fn silent() -> Self {
        Self { silent: true }
    }

    fn notice(&self, notice: &Notice) {
        self.dump(notice.level, &format!("{}{}", CONSOLE_PREFIX, notice.message));
    }

    fn dump(&self, level: NoticeLevel, text: &str) {
        if self.silent {
            return;
        }
        match level {
            NoticeLevel::Info => println!("{}", text),
            NoticeLevel::Warning | NoticeLevel::Error => eprintln!("{}", text),
        }
    }
}

/// What happened to a run.
#[derive(Debug)]
pub struct PublishOutcome {
    /// The server accepted the payload (or local mode pretended it did).
    pub published: bool,
    /// The payload, if it could be built.
    pub payload: Option<Payload>,
    /// The error that prevented publishing, if any.
    pub error: Option<ProbeDockError>,
    pub notices: Vec<Notice>,
    /// Pretty-printed payload, when printing is enabled.
    pub printed: Option<String>,
}

impl PublishOutcome {
    fn new() -> Self {
        Self {
            published: false,
            payload: None,
            error: None,
            notices: Vec::new(),
            printed: None,
        }
    }

    /// Body of the rejected HTTP response, if any.
    pub fn response_body(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(ProbeDockError::response)
            .map(|r| r.body.as_str())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Notice> {
        self.notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Warning)
    }
}

struct Reporter<'a> {
    console: &'a Console,
    notices: Vec<Notice>,
}

impl Reporter<'_> {
    fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        match level {
            NoticeLevel::Info => info!(target: "probedock_client::publish", "{}", notice.message),
            NoticeLevel::Warning => warn!(target: "probedock_client::publish", "{}", notice.message),
            NoticeLevel::Error => error!(target: "probedock_client::publish", "{}", notice.message),
        }
        self.console.notice(&notice);
        self.notices.push(notice);
    }

    fn info(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }
}

/// Drives one run through the publish pipeline.
pub struct Publisher<U> {
    server: Option<ServerProfile>,
    options: PublishOptions,
    uploader: U,
    uid: UidManager,
    console: Console,
}

impl Publisher<HttpUploader> {
    /// Publisher uploading over HTTP, writing to stdout/stderr.
    pub fn new(server: Option<ServerProfile>, options: PublishOptions) -> ProbeDockResult<Self> {
        Ok(Self::with_uploader(server, options, HttpUploader::new()?))
    }
}

impl<U: PayloadUploader> Publisher<U> {
    pub fn with_uploader(server: Option<ServerProfile>, options: PublishOptions, uploader: U) -> Self {
        let uid = UidManager::new(options.workspace.clone());
        Self {
            server,
            options,
            uploader,
            uid,
            console: Console::stdio(),
        }
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Publish `run`. The loaded uid is attached to the run unless it already has one.
    pub async fn process(&self, run: &mut TestRun) -> PublishOutcome {
        let mut outcome = PublishOutcome::new();
        let mut out = Reporter {
            console: &self.console,
            notices: Vec::new(),
        };

        let Some(server) = &self.server else {
            out.error("No server to publish results to");
            outcome.notices = out.notices;
            return outcome;
        };

        if run.uid().is_none() {
            if let Some(uid) = self.uid.load_uid().await {
                run.set_uid(uid);
            }
        }

        let mut cache = if self.options.cache_payload {
            self.load_cache(server, run, &mut out).await
        } else {
            None
        };

        for warning in run.quality_warnings() {
            out.warning(warning);
        }

        let payload = match run.to_payload(&PayloadOptions {
            version: server.api_version,
            cache: cache.as_ref(),
        }) {
            Ok(payload) => payload,
            Err(e) => {
                out.error(e.to_string());
                outcome.error = Some(e);
                outcome.notices = out.notices;
                return outcome;
            }
        };

        if !self.options.publish {
            out.info("Publishing disabled");
        } else {
            match self.send(server, &payload, &mut out).await {
                Ok(()) => outcome.published = true,
                Err(e) => {
                    out.error("Upload failed!");
                    out.error(e.to_string());
                    if let Some(response) = e.response() {
                        out.error("Dumping response body...");
                        self.console.dump(NoticeLevel::Error, &response.body);
                    }
                    outcome.error = Some(e);
                }
            }
        }

        if outcome.published {
            if let Some(cache) = cache.as_mut() {
                if let Err(e) = cache.save(run).await {
                    out.warning(format!("Could not save payload cache: {}", e));
                }
            }
        }

        if self.options.save_payload {
            self.save_payload(server, &payload, &mut out).await;
        }

        if self.options.print_payload {
            out.info("Printing payload...");
            let printed = payload
                .to_json_pretty()
                .unwrap_or_else(|_| format!("{:?}", payload));
            self.console.dump(NoticeLevel::Info, &printed);
            outcome.printed = Some(printed);
        }

        outcome.payload = Some(payload);
        outcome.notices = out.notices;
        outcome
    }

    async fn load_cache(
        &self,
        server: &ServerProfile,
        run: &TestRun,
        out: &mut Reporter<'_>,
    ) -> Option<PayloadCache> {
        let project_api_id = server
            .project_api_id
            .clone()
            .or_else(|| run.project().api_id.clone());
        let mut cache = PayloadCache::new(
            self.options.workspace.clone(),
            server.name.clone(),
            project_api_id,
        );

        match cache.load().await {
            Ok(CacheLoad::Discarded { reason }) => {
                out.warning(format!("Ignoring payload cache: {}", reason));
                Some(cache)
            }
            Ok(_) => Some(cache),
            Err(e) => {
                out.warning(format!("{}; payload caching disabled", e));
                None
            }
        }
    }

    async fn send(
        &self,
        server: &ServerProfile,
        payload: &Payload,
        out: &mut Reporter<'_>,
    ) -> ProbeDockResult<()> {
        out.info(format!(
            "Sending payload to {}...",
            server.api_url.as_deref().unwrap_or_default()
        ));

        if self.options.local_mode {
            out.warning("LOCAL MODE: not actually sending payload.");
        } else {
            let resolved = server.resolve()?;
            self.uploader.upload(&resolved, payload).await?;
        }

        out.info("Done!");
        Ok(())
    }

    async fn save_payload(&self, server: &ServerProfile, payload: &Payload, out: &mut Reporter<'_>) {
        let (Some(workspace), Some(name)) = (&self.options.workspace, server.name.as_deref()) else {
            let mut missing = Vec::new();
            if self.options.workspace.is_none() {
                missing.push("workspace");
            }
            if server.name.is_none() {
                missing.push("server name");
            }
            out.error(format!("Cannot save payload without a {}", missing.join(" and ")));
            return;
        };

        let path = server_dir(workspace, name).join(PAYLOAD_FILE);
        let written = match payload.to_json() {
            Ok(json) => write_atomic(&path, &json).await,
            Err(e) => Err(ProbeDockError::Payload {
                message: format!("failed to serialize payload: {}", e),
            }),
        };
        if let Err(e) = written {
            out.error(format!("Could not save payload: {}", e));
        }
    }
}
