//! Line-oriented parser for the gateway's native configuration.
//!
//! Only the directives needed to draw the whole-gateway view are
//! understood. Everything else inside a proxy section is kept verbatim in
//! `options`; `global` and `defaults` are skipped entirely.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: {kind} section has no name")]
    UnnamedSection { line: usize, kind: &'static str },

    #[error("line {line}: duplicate {kind} section '{name}'")]
    DuplicateSection {
        line: usize,
        kind: &'static str,
        name: String,
    },

    #[error("line {line}: malformed '{directive}' directive")]
    Malformed { line: usize, directive: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Frontend,
    Backend,
    Listen,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Frontend => "frontend",
            SectionKind::Backend => "backend",
            SectionKind::Listen => "listen",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawServer {
    pub name: String,
    pub address: String,
    /// Everything after the address, e.g. `check inter 5s`.
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acl {
    pub name: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseBackend {
    pub backend: String,
    /// Text after `if`; `None` for an unconditional switch.
    pub condition: Option<String>,
}

/// One `frontend`, `backend` or `listen` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub name: String,
    pub binds: Vec<String>,
    pub mode: Option<String>,
    pub balance: Option<String>,
    pub default_backend: Option<String>,
    pub servers: Vec<RawServer>,
    pub acls: Vec<Acl>,
    pub use_backends: Vec<UseBackend>,
    pub stats_enabled: bool,
    pub stats_uri: Option<String>,
    pub options: Vec<String>,
}

impl Section {
    fn new(kind: SectionKind, name: String) -> Self {
        Self {
            kind,
            name,
            binds: Vec::new(),
            mode: None,
            balance: None,
            default_backend: None,
            servers: Vec::new(),
            acls: Vec::new(),
            use_backends: Vec::new(),
            stats_enabled: false,
            stats_uri: None,
            options: Vec::new(),
        }
    }

    /// Condition text of the named ACL, if defined in this section.
    pub fn acl(&self, name: &str) -> Option<&str> {
        self.acls
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.condition.as_str())
    }

    fn apply(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let (directive, rest) = match text.split_once(char::is_whitespace) {
            Some((d, r)) => (d, r.trim()),
            None => (text, ""),
        };
        match directive {
            "bind" => self.binds.push(rest.to_string()),
            "mode" => self.mode = Some(rest.to_string()),
            "balance" => self.balance = Some(rest.to_string()),
            "default_backend" => self.default_backend = Some(rest.to_string()),
            "server" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (name, address) = match (parts.next(), parts.next()) {
                    (Some(n), Some(a)) if !n.is_empty() && !a.is_empty() => (n, a),
                    _ => {
                        return Err(ParseError::Malformed {
                            line,
                            directive: "server",
                        })
                    }
                };
                self.servers.push(RawServer {
                    name: name.to_string(),
                    address: address.to_string(),
                    options: parts.next().unwrap_or("").trim().to_string(),
                });
            }
            "acl" => {
                let (name, condition) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ParseError::Malformed {
                        line,
                        directive: "acl",
                    })?;
                self.acls.push(Acl {
                    name: name.to_string(),
                    condition: condition.trim().to_string(),
                });
            }
            "use_backend" => {
                if rest.is_empty() {
                    return Err(ParseError::Malformed {
                        line,
                        directive: "use_backend",
                    });
                }
                let (backend, condition) = match rest.split_once(" if ") {
                    Some((b, c)) => (b.trim(), Some(c.trim().to_string())),
                    None => (rest, None),
                };
                self.use_backends.push(UseBackend {
                    backend: backend.to_string(),
                    condition,
                });
            }
            "stats" => {
                if rest == "enable" {
                    self.stats_enabled = true;
                } else if let Some(uri) = rest.strip_prefix("uri ") {
                    self.stats_uri = Some(uri.trim().to_string());
                }
            }
            _ => self.options.push(text.to_string()),
        }
        Ok(())
    }
}

/// Parsed gateway configuration: proxy sections in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayConfig {
    pub sections: Vec<Section>,
}

impl GatewayConfig {
    fn of_kind(&self, kind: SectionKind) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    pub fn frontends(&self) -> impl Iterator<Item = &Section> {
        self.of_kind(SectionKind::Frontend)
    }

    pub fn backends(&self) -> impl Iterator<Item = &Section> {
        self.of_kind(SectionKind::Backend)
    }

    pub fn listens(&self) -> impl Iterator<Item = &Section> {
        self.of_kind(SectionKind::Listen)
    }

    pub fn section(&self, kind: SectionKind, name: &str) -> Option<&Section> {
        self.of_kind(kind).find(|s| s.name == name)
    }
}

enum Current {
    None,
    Skipped,
    Proxy(Section),
}

/// Parse configuration text.
pub fn parse(text: &str) -> Result<GatewayConfig, ParseError> {
    let mut config = GatewayConfig::default();
    let mut current = Current::None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (trimmed, ""),
        };
        let kind = match keyword {
            "global" | "defaults" => {
                close(&mut config, &mut current);
                current = Current::Skipped;
                continue;
            }
            "frontend" => Some(SectionKind::Frontend),
            "backend" => Some(SectionKind::Backend),
            "listen" => Some(SectionKind::Listen),
            _ => None,
        };

        if let Some(kind) = kind {
            close(&mut config, &mut current);
            let name = rest.split_whitespace().next().ok_or(ParseError::UnnamedSection {
                line,
                kind: kind.as_str(),
            })?;
            if config.section(kind, name).is_some() {
                return Err(ParseError::DuplicateSection {
                    line,
                    kind: kind.as_str(),
                    name: name.to_string(),
                });
            }
            current = Current::Proxy(Section::new(kind, name.to_string()));
            continue;
        }

        if let Current::Proxy(section) = &mut current {
            section.apply(line, trimmed)?;
        }
    }
    close(&mut config, &mut current);

    tracing::debug!(sections = config.sections.len(), "Parsed gateway configuration");
    Ok(config)
}

fn close(config: &mut GatewayConfig, current: &mut Current) {
    if let Current::Proxy(section) = std::mem::replace(current, Current::None) {
        config.sections.push(section);
    }
}
