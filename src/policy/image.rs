//! Image metadata read from `docker inspect` output.

use crate::Result;
use crate::expr::{Context, Value};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use ohno::{IntoAppError, bail};
use regex::Regex;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

pub const LABEL_NIM_VERSION: &str = "com.nvidia.nim.version";
pub const LABEL_MODEL_NAME: &str = "com.nvidia.nim.model.name";
pub const LABEL_MODEL_VERSION: &str = "com.nvidia.nim.model.version";
pub const LABEL_QUANTIZATION: &str = "com.nvidia.nim.model.quantization";

static PORT_SPEC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)").expect("invalid regex"));

/// Parts of an image reference such as `nvcr.io/nim/meta/llama3:1.0@sha256:...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        let mut rest = reference;
        let mut digest = None;
        if let Some((name, d)) = rest.rsplit_once('@') {
            digest = Some(d.to_string());
            rest = name;
        }

        let mut tag = None;
        if let Some((name, t)) = rest.rsplit_once(':') {
            // `host:5000/app` and a bare `registry.local:5000` carry a port, not a tag
            let registry_port = t.contains('/')
                || (!name.contains('/') && looks_like_registry(name) && t.chars().all(|c| c.is_ascii_digit()));
            if !registry_port {
                tag = Some(t.to_string());
                rest = name;
            }
        }

        let parts: Vec<&str> = rest.split('/').collect();
        let (registry, repository) = match parts.as_slice() {
            [single] => (None, (*single).to_string()),
            [first, second] if looks_like_registry(first) => {
                (Some((*first).to_string()), (*second).to_string())
            }
            [_, _] => (None, rest.to_string()),
            [first, others @ ..] => (Some((*first).to_string()), others.join("/")),
            [] => (None, rest.to_string()),
        };

        Self {
            registry,
            repository,
            tag,
            digest,
        }
    }
}

fn looks_like_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

/// Metadata of a NIM container image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub reference: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub created: Option<DateTime<Utc>>,
    pub architecture: Option<String>,
    pub os: Option<String>,
    pub nim_version: Option<String>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub quantization: Option<String>,
    pub env: BTreeMap<String, String>,
    pub exposed_ports: Vec<u16>,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,

    /// The inspect document's `Config` object.
    pub config: serde_json::Map<String, Json>,
}

fn string_list(value: Option<&Json>) -> Vec<String> {
    match value {
        Some(Json::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(Json::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn optional_string(value: Option<&Json>) -> Option<String> {
    value.and_then(Json::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

impl ImageMetadata {
    /// Reads a `docker inspect` JSON file.
    pub fn load(path: &Utf8Path, reference: Option<&str>) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading image inspect file '{path}'"))?;
        let json: Json = serde_json::from_str(&text).into_app_err_with(|| format!("parsing image inspect file '{path}'"))?;
        Self::from_inspect(&json, reference).into_app_err_with(|| format!("interpreting image inspect file '{path}'"))
    }

    /// Builds metadata from a `docker inspect` document.
    ///
    /// Accepts either the inspect object itself or the one-element array that
    /// `docker inspect` prints. When `reference` is `None`, the first repo tag
    /// is used, falling back to the image id.
    pub fn from_inspect(json: &Json, reference: Option<&str>) -> Result<Self> {
        let inspect = match json {
            Json::Array(items) => match items.as_slice() {
                [single] => single,
                [] => bail!("image inspect document is an empty array"),
                _ => bail!("image inspect document describes {} images, expected one", items.len()),
            },
            other => other,
        };

        let Some(inspect) = inspect.as_object() else {
            bail!("image inspect document is not a JSON object");
        };

        let config = inspect.get("Config").and_then(Json::as_object).cloned().unwrap_or_default();

        let labels: BTreeMap<String, String> = config
            .get("Labels")
            .and_then(Json::as_object)
            .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string()))).collect())
            .unwrap_or_default();

        let env = string_list(config.get("Env"))
            .into_iter()
            .filter_map(|item| item.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect();

        let mut exposed_ports: Vec<u16> = config
            .get("ExposedPorts")
            .and_then(Json::as_object)
            .map(|ports| {
                ports
                    .keys()
                    .filter_map(|spec| PORT_SPEC.captures(spec).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok()))
                    .collect()
            })
            .unwrap_or_default();
        exposed_ports.sort_unstable();
        exposed_ports.dedup();

        let id = optional_string(inspect.get("Id"));
        let reference = reference.map(str::to_string).or_else(|| {
            inspect
                .get("RepoTags")
                .and_then(Json::as_array)
                .and_then(|tags| tags.first())
                .and_then(Json::as_str)
                .map(str::to_string)
        });
        let Some(reference) = reference.or_else(|| id.clone()) else {
            bail!("image inspect document has neither RepoTags nor Id, pass a reference explicitly");
        };

        let parsed = ImageReference::parse(&reference);
        let created = optional_string(inspect.get("Created"))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            repository: if parsed.repository.is_empty() { reference.clone() } else { parsed.repository },
            tag: parsed.tag,
            digest: parsed.digest.or(id),
            nim_version: labels.get(LABEL_NIM_VERSION).cloned(),
            model_name: labels.get(LABEL_MODEL_NAME).cloned(),
            model_version: labels.get(LABEL_MODEL_VERSION).cloned(),
            quantization: labels.get(LABEL_QUANTIZATION).cloned(),
            reference,
            labels,
            created,
            architecture: optional_string(inspect.get("Architecture")),
            os: optional_string(inspect.get("Os")),
            env,
            exposed_ports,
            entrypoint: string_list(config.get("Entrypoint")),
            cmd: string_list(config.get("Cmd")),
            config,
        })
    }

    /// The variables rule conditions are evaluated against.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::new()
            .with("reference", self.reference.as_str())
            .with("repository", self.repository.as_str())
            .with("tag", self.tag.clone())
            .with("labels", self.labels.clone())
            .with("env", self.env.clone())
            .with("exposed_ports", self.exposed_ports.clone())
            .with("entrypoint", self.entrypoint.clone())
            .with("cmd", self.cmd.clone())
            .with("architecture", self.architecture.clone())
            .with("os", self.os.clone())
            .with("nim_version", self.nim_version.clone())
            .with("model_name", self.model_name.clone())
            .with("model_version", self.model_version.clone())
            .with("quantization", self.quantization.clone())
            .with("config", Value::from(Json::Object(self.config.clone())))
    }
}
