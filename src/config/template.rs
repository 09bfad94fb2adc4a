//! Default files and directory layout under the web root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::loader::ConfigError;

/// Written to `appdata/.cfg/.all` when no config exists yet.
pub const DEFAULT_CONFIG: &str = r#"
# ---------------------------------------------------------------------
# Site configuration. Edits are picked up while the server runs.
#
#   - key and value are separated by one or more spaces
#   - lines starting with # are comments
#   - end a line with a backslash (\) to continue it on the next line
#   - section names and keys are case-insensitive; the usual layout is
#        SectionName
#           key  value
# ---------------------------------------------------------------------

# Hostname the site is reached by from outside. Requests naming another
# host are rejected when host validation is enabled.
Site
    hostname             localhost
    # comma separated local or public names, e.g. myhost, www.mydomain.com
    alternate-hostnames
    portno               8085
    proto                http

# Full paths to the PEM certificate and private key.
TLS
    #cert /srv/mysite/appdata/certs/mydomain/cert.pem
    #key  /srv/mysite/appdata/certs/mydomain/key.pem

# Put the whole site in maintenance (on/off).
maintenance-window     off

# Send plain HTTP visitors to HTTPS (yes/no).
redirect-http-to-https no

Admin
    # comma separated addresses allowed into the admin application
    allowed-ip-addr      127.0.0.1
    run-on-startup       yes
    portno               30000

# Site-wide banner. With seconds-to-display above zero the banner turns
# itself off after that many seconds; zero leaves it to the operator.
MessageBanner
    display-mode         off
    seconds-to-display   0

# Evaluated in this order: restrict-paths (401), exclude-paths (404),
# forward-paths (307), conditional-http-service.
# Every path must be relative (start with a slash).
URLPaths
    # restrict-paths  /gallery, /accounting
    restrict-paths
    # exclude-paths   /old-gallery
    exclude-paths
    # forward-paths   /a-long-blog-name|/latest-blog, /old|/new
    # only relative destinations are honored
    forward-paths
    # serve a path only to requests matching a header, ip-address or
    # query-string criterion, e.g.
    # conditional-http-service [{"rule-type":"header","url-path":"/robots.txt","serve-only-to-criteria":["bingbot","Googlebot"],"http-status-code":404}]
    conditional-http-service

HTTP
    allowed-methods      GET, HEAD, OPTIONS

# Free-form values: key (no spaces) followed by any text.
#     db-conn    Host=localhost;Port=5432;Database=mydb
#     feature    {"beta":["v1","v2"]}
Data

"#;

/// Written to `appdata/.cfg/blocked-ip` when absent.
pub const DEFAULT_BLOCKED_IP: &str = r#"
# Connections from these addresses are dropped.
# Format: <ip address> <one or more spaces> <reason>
# 10.12.3.4 repeated login attempts
"#;

/// Filesystem locations derived from the web root.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    pub web_root: PathBuf,
    pub appdata: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub swap_file: PathBuf,
    pub blocked_ip_file: PathBuf,
    pub certs_dir: PathBuf,
    pub self_signed_dir: PathBuf,
    pub public_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(web_root: &Path) -> Self {
        let appdata = web_root.join("appdata");
        let config_dir = appdata.join(".cfg");
        let certs_dir = appdata.join("certs");
        Self {
            web_root: web_root.to_path_buf(),
            config_file: config_dir.join(".all"),
            swap_file: config_dir.join(".all.swap"),
            blocked_ip_file: config_dir.join("blocked-ip"),
            self_signed_dir: certs_dir.join("self"),
            public_dir: web_root.join("wwwroot"),
            appdata,
            config_dir,
            certs_dir,
        }
    }

    /// Creates missing directories and default files. Existing files are
    /// left untouched.
    pub fn ensure(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.appdata,
            &self.config_dir,
            &self.certs_dir,
            &self.self_signed_dir,
            &self.public_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;
        }

        if !self.config_file.exists() {
            fs::write(&self.config_file, DEFAULT_CONFIG)
                .map_err(|e| ConfigError::io(&self.config_file, e))?;
            tracing::info!(path = %self.config_file.display(), "Wrote default config");
        }
        if !self.blocked_ip_file.exists() {
            fs::write(&self.blocked_ip_file, DEFAULT_BLOCKED_IP)
                .map_err(|e| ConfigError::io(&self.blocked_ip_file, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_blocked_ips;
    use crate::config::parser::parse_config;

    #[test]
    fn test_default_template_parses() {
        let cfg = parse_config(DEFAULT_CONFIG);
        assert_eq!(cfg.site.hostname, "localhost");
        assert_eq!(cfg.site.port, 8085);
        assert!(cfg.site.alternate_hostnames.is_empty());
        assert!(cfg.tls.cert_file_path.is_none());
        assert!(!cfg.maintenance_window_on);
        assert_eq!(cfg.admin.allowed_ip, vec!["127.0.0.1"]);
        assert!(!cfg.message_banner.on);
        assert!(cfg.url_paths.conditional.is_empty());
        assert_eq!(cfg.http.allowed_methods, vec!["GET", "HEAD", "OPTIONS"]);
        assert!(cfg.data.is_empty());
        assert!(parse_blocked_ips(DEFAULT_BLOCKED_IP).is_empty());
    }

    #[test]
    fn test_ensure_creates_layout_once() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = SiteLayout::new(temp.path());
        layout.ensure().unwrap();
        assert!(layout.self_signed_dir.is_dir());
        assert!(layout.config_file.is_file());

        fs::write(&layout.config_file, "HTTP\n allowed-methods GET\n").unwrap();
        layout.ensure().unwrap();
        let kept = fs::read_to_string(&layout.config_file).unwrap();
        assert!(kept.contains("allowed-methods GET"));
    }
}
