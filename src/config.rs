use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::util::split_key_basic;

pub(crate) const DEFAULT_SERVER: &str = "http://lifemapper.org";
const RC_FILE: &str = ".lmclientrc";

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
}

pub(crate) fn load_config(
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    let mut url = url.or_else(|| std::env::var("LMCLIENT_URL").ok());
    let mut key = key.or_else(|| std::env::var("LMCLIENT_KEY").ok());
    let mut file_verify: Option<bool> = None;

    if url.is_none() || key.is_none() || verify.is_none() {
        for rc_path in rc_candidates() {
            if rc_path.exists() {
                let cfg = read_rc(&rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;
                log::debug!("using configuration file {}", rc_path.display());

                if url.is_none() {
                    url = cfg.url;
                }
                if key.is_none() {
                    key = cfg.key;
                }
                file_verify = cfg.verify;
                break;
            }
        }
    }

    resolve(url, key, verify.or(file_verify))
}

fn resolve(url: Option<String>, key: Option<String>, verify: Option<bool>) -> Result<ClientConfig> {
    let url = url
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    // Anonymous access is allowed; a key only matters for private data.
    let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    if let Some(k) = &key {
        if split_key_basic(k).is_none() {
            bail!(
                "Invalid configuration: key must be `<user>:<password>` (set LMCLIENT_KEY or put `key:` in {})",
                RC_FILE
            );
        }
    }

    Ok(ClientConfig {
        url,
        key,
        verify: verify.unwrap_or(true),
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // `key:` may be alone on its line with the value on the next one.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !is_setting(line) {
                let v = strip_quotes(line);
                match pk {
                    "url" => cfg.url = Some(v.to_string()),
                    "key" => cfg.key = Some(v.to_string()),
                    _ => {}
                }
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let v = strip_quotes(v.trim());
            match k.trim() {
                "url" if v.is_empty() => pending_key = Some("url"),
                "url" => cfg.url = Some(v.to_string()),
                "key" if v.is_empty() => pending_key = Some("key"),
                "key" => cfg.key = Some(v.to_string()),
                "verify" if !v.is_empty() => cfg.verify = Some(v != "0"),
                _ => {}
            }
        }
    }

    cfg
}

fn is_setting(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(k, _)| matches!(k.trim(), "url" | "key" | "verify"))
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) LMCLIENT_RC (explicit)
    // 2) ./.lmclientrc
    // 3) ~/.lmclientrc
    if let Ok(p) = std::env::var("LMCLIENT_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(RC_FILE));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(RC_FILE));
    }
    v
}
