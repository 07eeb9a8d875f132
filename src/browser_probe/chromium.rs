//! Chromium-backed implementation of the browser capability
//!
//! Drives a headless Chromium over CDP. Request URLs are collected from
//! `Network.requestWillBeSent` events on a background task so the wire
//! capture keeps running while navigation is still settling.

use super::{BrowserEngine, BrowserSession};
use crate::config::BrowserProbeConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSent};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Engine that opens headless Chromium sessions
pub struct ChromiumEngine;

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open(&self, config: &BrowserProbeConfig) -> Result<Box<dyn BrowserSession>> {
        let session = ChromiumSession::launch(config).await?;
        Ok(Box::new(session))
    }
}

fn build_browser_config(config: &BrowserProbeConfig) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport_width, config.viewport_height)
        .request_timeout(config.nav_timeout + config.quiescence_timeout)
        .no_sandbox()
        .args(["--disable-gpu", "--mute-audio", "--disable-dev-shm-usage"]);
    if let Some(path) = &config.chrome_path {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(Error::Browser)
}

fn browser_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Browser(format!("{}: {}", context, e))
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    requests: Arc<Mutex<Vec<String>>>,
    quiescence_timeout: Duration,
    handler_task: JoinHandle<()>,
    observer_task: JoinHandle<()>,
}

impl ChromiumSession {
    async fn launch(config: &BrowserProbeConfig) -> Result<Self> {
        let browser_config = build_browser_config(config)?;
        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| browser_err("browser launch failed", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler error");
                }
            }
        });

        match Self::attach_page(&browser, config).await {
            Ok((page, requests, observer_task)) => Ok(Self {
                browser,
                page,
                requests,
                quiescence_timeout: config.quiescence_timeout,
                handler_task,
                observer_task,
            }),
            Err(e) => {
                // The browser process outlives a failed setup unless we
                // reap it here.
                if let Err(close_err) = browser.close().await {
                    tracing::debug!(error = %close_err, "Browser close after failed setup");
                }
                let _ = browser.wait().await;
                handler_task.abort();
                Err(e)
            }
        }
    }

    async fn attach_page(
        browser: &Browser,
        config: &BrowserProbeConfig,
    ) -> Result<(Page, Arc<Mutex<Vec<String>>>, JoinHandle<()>)> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_err("page open failed", e))?;
        page.set_user_agent(config.user_agent.clone())
            .await
            .map_err(|e| browser_err("user agent override failed", e))?;
        page.execute(EnableParams::default())
            .await
            .map_err(|e| browser_err("network domain enable failed", e))?;

        let mut events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| browser_err("request listener failed", e))?;

        let requests = Arc::new(Mutex::new(Vec::new()));
        let sink = requests.clone();
        let observer_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                sink.lock().await.push(event.request.url.clone());
            }
        });

        Ok((page, requests, observer_task))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let loaded = match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(browser_err("navigation failed", e)),
            Err(_) => Err(Error::BrowserTimeout(timeout)),
        };

        // Even when load never fires, most player requests land shortly
        // after; give the network a bounded chance to go quiet.
        match tokio::time::timeout(self.quiescence_timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::trace!(error = %e, "Navigation watcher errored"),
            Err(_) => tracing::trace!("Network activity did not settle"),
        }

        loaded
    }

    async fn observed_requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_err("content read failed", e))
    }

    async fn close(self: Box<Self>) {
        let ChromiumSession {
            mut browser,
            page,
            observer_task,
            handler_task,
            ..
        } = *self;

        observer_task.abort();
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "Page close failed");
        }
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "Browser close failed");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Browser process reap failed");
        }
        handler_task.abort();
    }
}
