use crate::env_truthy;
use phrasepipe_core::{Error, FetchSettings, PageFetcher, PageRequest, Result};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Extra wall-clock allowance for browser launch/teardown on top of the
/// navigation timeout.
const HARD_TIMEOUT_SLACK_MS: u64 = 10_000;

// Contract with the Rust side:
// - args arrive as JSON on stdin
// - stdout carries exactly one JSON object, `{ok:true, html, ...}` or `{ok:false, error}`
// - the browser is closed in `finally`, whatever happened before
const JS: &str = r#"
const fs = require('fs');

function ok(obj) { process.stdout.write(JSON.stringify(obj)); }
function bad(code, message) { ok({ ok: false, error: { code, message } }); }

async function main() {
  let req;
  try { req = JSON.parse(fs.readFileSync(0, 'utf8')); } catch (e) {
    return bad('invalid_params', 'bad JSON args');
  }

  let pw;
  try { pw = require('playwright'); } catch (e) {
    return bad('not_configured',
      'Playwright is not installed for Node.js (require("playwright") failed). ' +
      'Install it with `npm i -g playwright` and `npx playwright install chromium`.');
  }

  const url = String(req.url || '').trim();
  if (!url) return bad('invalid_params', 'url must be non-empty');
  const timeoutMs = Number(req.timeout_ms || 200000);

  const t0 = Date.now();
  let browser;
  try {
    browser = await pw.chromium.launch({ headless: true });
    const page = await browser.newPage();
    const resp = await page.goto(url, { waitUntil: 'load', timeout: timeoutMs });
    const html = await page.content();
    ok({ ok: true, status: resp ? resp.status() : null, html, elapsed_ms: Date.now() - t0 });
  } catch (e) {
    const code = (e && e.name === 'TimeoutError') ? 'timeout' : 'fetch_failed';
    bad(code, String(e && e.message ? e.message : e));
  } finally {
    try { if (browser) await browser.close(); } catch (_) {}
  }
}

main().catch((e) => bad('fetch_failed', String(e && e.message ? e.message : e)));
"#;

/// Headless-browser page fetcher (Node + Playwright + Chromium).
///
/// Each call launches its own browser, opens one page, reads the rendered
/// document and closes the browser again. The child process is killed if it
/// outlives the navigation timeout plus [`HARD_TIMEOUT_SLACK_MS`].
#[derive(Debug, Clone)]
pub struct RenderFetcher {
    settings: FetchSettings,
    node_bin: String,
    node_path: Option<String>,
}

impl RenderFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self {
            settings,
            node_bin: "node".to_string(),
            node_path: None,
        }
    }

    pub fn with_node_bin(mut self, node_bin: impl Into<String>) -> Self {
        self.node_bin = node_bin.into();
        self
    }

    /// Module search path handed to Node as `NODE_PATH` (where `playwright` lives).
    pub fn with_node_path(mut self, node_path: Option<String>) -> Self {
        self.node_path = node_path.filter(|s| !s.trim().is_empty());
        self
    }
}

fn node_path_has_playwright(np: &str) -> bool {
    np.split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| std::path::Path::new(p).join("playwright").is_dir())
}

/// Best-effort lookup of a global module root containing Playwright, so users
/// don't have to export `NODE_PATH` themselves.
fn detect_node_path_for_playwright() -> Option<String> {
    let existing = std::env::var("NODE_PATH").unwrap_or_default();
    if node_path_has_playwright(&existing) {
        return None;
    }

    let mut candidates: Vec<String> = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(std::path::PathBuf::from) {
        candidates.push(
            home.join(".npm-global")
                .join("lib")
                .join("node_modules")
                .to_string_lossy()
                .to_string(),
        );
    }
    candidates.push("/opt/homebrew/lib/node_modules".to_string());
    candidates.push("/usr/local/lib/node_modules".to_string());
    candidates.push("/usr/lib/node_modules".to_string());

    let found = candidates
        .into_iter()
        .find(|root| node_path_has_playwright(root))?;
    if existing.trim().is_empty() {
        Some(found)
    } else {
        Some(format!("{existing}:{found}"))
    }
}

/// Map the script's stdout (one JSON object) to rendered HTML or an error.
fn parse_render_output(stdout: &str, stderr: &str) -> Result<String> {
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).map_err(|e| {
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Error::Fetch(format!("render returned invalid JSON: {e}"))
        } else {
            Error::Fetch(format!("render returned invalid JSON: {e}. stderr: {stderr}"))
        }
    })?;

    if v.get("ok").and_then(|x| x.as_bool()) != Some(true) {
        let code = v
            .pointer("/error/code")
            .and_then(|x| x.as_str())
            .unwrap_or("fetch_failed");
        let message = v
            .pointer("/error/message")
            .and_then(|x| x.as_str())
            .unwrap_or("render failed")
            .to_string();
        return Err(match code {
            "not_configured" => Error::NotConfigured(message),
            "invalid_params" => Error::InvalidUrl(message),
            "timeout" => Error::Timeout(message),
            _ => Error::Fetch(message),
        });
    }

    let html = v
        .get("html")
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string();
    if html.trim().is_empty() {
        return Err(Error::Fetch("render returned empty HTML".to_string()));
    }
    Ok(html)
}

#[async_trait::async_trait]
impl PageFetcher for RenderFetcher {
    fn name(&self) -> &'static str {
        "render"
    }

    async fn fetch_page(&self, req: &PageRequest) -> Result<String> {
        if env_truthy("PHRASEPIPE_RENDER_DISABLE") {
            return Err(Error::NotConfigured(
                "render backend disabled (PHRASEPIPE_RENDER_DISABLE)".to_string(),
            ));
        }

        let timeout_ms = self.settings.timeout_ms;
        let args_json = serde_json::json!({
            "url": req.uri,
            "timeout_ms": timeout_ms,
        })
        .to_string();

        let mut cmd = tokio::process::Command::new(&self.node_bin);
        if let Some(node_path) = self
            .node_path
            .clone()
            .or_else(detect_node_path_for_playwright)
        {
            cmd.env("NODE_PATH", node_path);
        }
        let mut child = cmd
            .arg("-e")
            .arg(JS)
            .kill_on_drop(true)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::NotConfigured(format!(
                    "render backend requires Node.js ({}) and the Playwright npm package: {e}",
                    self.node_bin
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A failed write surfaces as a JSON error from the script.
            let _ = stdin.write_all(args_json.as_bytes()).await;
            let _ = stdin.shutdown().await;
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Fetch("render: missing stdout pipe".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Fetch("render: missing stderr pipe".to_string()))?;
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut stdout, &mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut stderr, &mut buf).await;
            buf
        });

        let hard_timeout = Duration::from_millis(timeout_ms.saturating_add(HARD_TIMEOUT_SLACK_MS));
        match tokio::time::timeout(hard_timeout, child.wait()).await {
            Ok(r) => {
                r.map_err(|e| Error::Fetch(format!("render: waiting for node failed: {e}")))?;
            }
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(Error::Timeout(format!(
                    "{}: render hard timeout after {}ms",
                    req.uri,
                    hard_timeout.as_millis()
                )));
            }
        }

        let out_stdout = stdout_task.await.unwrap_or_default();
        let out_stderr = stderr_task.await.unwrap_or_default();
        let html = parse_render_output(
            &String::from_utf8_lossy(&out_stdout),
            &String::from_utf8_lossy(&out_stderr),
        )
        .map_err(|e| match e {
            Error::Timeout(m) => Error::Timeout(format!("{}: {m}", req.uri)),
            other => other,
        })?;
        tracing::debug!(page = req.page_index, chars = html.len(), "page rendered");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_render() {
        let html = parse_render_output(r#"{"ok":true,"status":200,"html":"<p>x</p>"}"#, "").unwrap();
        assert_eq!(html, "<p>x</p>");
    }

    #[test]
    fn maps_script_error_codes() {
        let cases = [
            ("timeout", "Timeout"),
            ("not_configured", "NotConfigured"),
            ("invalid_params", "InvalidUrl"),
            ("fetch_failed", "Fetch"),
        ];
        for (code, want) in cases {
            let out = format!(r#"{{"ok":false,"error":{{"code":"{code}","message":"m"}}}}"#);
            let err = parse_render_output(&out, "").unwrap_err();
            let got = match err {
                Error::Timeout(_) => "Timeout",
                Error::NotConfigured(_) => "NotConfigured",
                Error::InvalidUrl(_) => "InvalidUrl",
                Error::Fetch(_) => "Fetch",
                _ => "other",
            };
            assert_eq!(got, want, "{code}");
        }
    }

    #[test]
    fn rejects_garbage_and_empty_html() {
        let err = parse_render_output("Segmentation fault", "boom").unwrap_err();
        assert!(matches!(err, Error::Fetch(ref m) if m.contains("boom")));
        assert!(parse_render_output(r#"{"ok":true,"html":"  "}"#, "").is_err());
    }

    #[tokio::test]
    async fn missing_node_is_not_configured() {
        let f = RenderFetcher::new(FetchSettings::default())
            .with_node_bin("/nonexistent/phrasepipe-node-bin");
        let err = f
            .fetch_page(&PageRequest {
                page_index: 1,
                uri: "https://example.com/".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)), "{err}");
    }
}
