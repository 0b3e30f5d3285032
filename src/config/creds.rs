//! Credential resolution
//!
//! Credentials come from the environment (`ST_*` or `OS_*` variables, one
//! style only) or from a credentials file whose lines assign those same
//! variables. The file, when given, overrides the environment.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Resolved storage credentials
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Auth endpoint URL
    pub endpoint: String,
    /// User name
    pub username: String,
    /// Password / key
    pub password: String,
    /// Tenant id (OS_ style only, may be empty)
    pub tenant_id: String,
    /// Tenant name (OS_ style only, may be empty)
    pub tenant_name: String,
}

fn getenv(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

impl Credentials {
    /// Resolve credentials from ST_/OS_ environment variables
    ///
    /// Exactly one variable style may be present, and a present style must be
    /// complete. An empty environment yields empty credentials; the caller
    /// decides whether that is fatal.
    pub fn from_env() -> Result<Self> {
        let st: Vec<String> = ["ST_AUTH", "ST_USER", "ST_KEY"]
            .iter()
            .map(|v| getenv(v))
            .collect();
        let st_count = st.iter().filter(|v| !v.is_empty()).count();

        let os: Vec<String> = [
            "OS_AUTH_URL",
            "OS_USERNAME",
            "OS_PASSWORD",
            "OS_TENANT_ID",
            "OS_TENANT_NAME",
        ]
        .iter()
        .map(|v| getenv(v))
        .collect();
        let os_count = os.iter().filter(|v| !v.is_empty()).count();

        if st_count > 0 && os_count > 0 {
            bail!("you have both ST_ and OS_ style variables defined in your environment and you must only have 1 type");
        }
        if st_count > 0 && st_count != 3 {
            bail!("you have at least 1 ST_ style variable defined but not all 3");
        }
        if os_count > 0 {
            if os[0].is_empty() || os[1].is_empty() || os[2].is_empty() {
                bail!("your environment has at least 1 OS_ style variable defined but not OS_AUTH_URL, OS_USERNAME or OS_PASSWORD");
            }
            if os[3].is_empty() && os[4].is_empty() {
                bail!("your environment has at least 1 OS_ style variable defined but not OS_TENANT_NAME or OS_TENANT_ID");
            }
        }

        if st_count == 3 {
            Ok(Self {
                endpoint: st[0].clone(),
                username: st[1].clone(),
                password: st[2].clone(),
                ..Default::default()
            })
        } else if os_count > 0 {
            Ok(Self {
                endpoint: os[0].clone(),
                username: os[1].clone(),
                password: os[2].clone(),
                tenant_id: os[3].clone(),
                tenant_name: os[4].clone(),
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Read credentials from a file of VAR=value lines
    ///
    /// Recognizes both ST_ and OS_ style assignments; values may carry shell
    /// quoting or a trailing semicolon, which is stripped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("couldn't read creds file: {}", path.display()))?;

        let mut creds = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((var, value)) = line.split_once('=') else {
                continue;
            };
            let var = var.trim_start_matches("export ").trim();
            let value = value.trim_matches(|c| c == ';' || c == '\'' || c == '"').to_string();
            match var {
                "OS_AUTH_URL" | "ST_AUTH" => creds.endpoint = value,
                "OS_USERNAME" | "ST_USER" => creds.username = value,
                "OS_PASSWORD" | "ST_KEY" => creds.password = value,
                "OS_TENANT_ID" => creds.tenant_id = value,
                "OS_TENANT_NAME" => creds.tenant_name = value,
                _ => {}
            }
        }
        Ok(creds)
    }

    /// True when endpoint, username and password are all present
    pub fn is_complete(&self) -> bool {
        !self.endpoint.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_creds_file_os_style() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# swift credentials").unwrap();
        writeln!(file, "OS_AUTH_URL=https://auth.example.com/v2.0;").unwrap();
        writeln!(file, "OS_USERNAME='loadgen'").unwrap();
        writeln!(file, "OS_PASSWORD=\"secret\"").unwrap();
        writeln!(file, "OS_TENANT_NAME=perf").unwrap();

        let creds = Credentials::from_file(file.path()).unwrap();
        assert_eq!(creds.endpoint, "https://auth.example.com/v2.0");
        assert_eq!(creds.username, "loadgen");
        assert_eq!(creds.password, "secret");
        assert_eq!(creds.tenant_name, "perf");
        assert!(creds.is_complete());
    }

    #[test]
    fn test_creds_file_st_style() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ST_AUTH=https://swift.example.com/auth/v1.0").unwrap();
        writeln!(file, "ST_USER=account:user").unwrap();
        writeln!(file, "ST_KEY=key").unwrap();

        let creds = Credentials::from_file(file.path()).unwrap();
        assert_eq!(creds.username, "account:user");
        assert!(creds.tenant_id.is_empty());
        assert!(creds.is_complete());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Credentials::from_file(Path::new("/nonexistent/creds")).is_err());
    }

    #[test]
    fn test_incomplete_creds() {
        let creds = Credentials {
            endpoint: "https://auth.example.com".into(),
            ..Default::default()
        };
        assert!(!creds.is_complete());
    }
}
